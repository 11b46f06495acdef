mod page_test;

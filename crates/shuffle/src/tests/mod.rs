mod helpers;
mod node_tests;
mod sort_tests;

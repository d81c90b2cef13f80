pub(crate) mod common;

mod recovery_tests;

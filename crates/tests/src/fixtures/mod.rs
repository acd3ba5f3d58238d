pub mod harness;
pub mod test_app;

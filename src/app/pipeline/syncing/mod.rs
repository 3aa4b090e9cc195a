pub mod r#in;
pub mod out;

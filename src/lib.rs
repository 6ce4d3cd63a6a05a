#[allow(non_snake_case)]
pub mod NLP;
#[allow(non_snake_case)]
pub mod OptimalControl;
#[allow(non_snake_case)]
pub mod Utils;
pub mod cli;

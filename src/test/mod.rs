#[cfg(test)]
pub mod sample;

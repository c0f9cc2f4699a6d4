pub mod package;
pub mod progress;

#[cfg(test)]
pub(crate) mod test_support;

pub mod assembler;
pub mod extractor;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod years;

#[cfg(test)]
pub mod test_support;

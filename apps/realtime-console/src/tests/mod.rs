mod error;
mod sink;

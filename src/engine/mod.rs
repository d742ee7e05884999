pub mod acceptance;
pub mod broadcast;
pub mod completion;
pub mod placement;
pub mod status;

#[cfg(test)]
mod testing;

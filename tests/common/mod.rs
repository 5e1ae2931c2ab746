#[cfg(test)]
mod fixture;
#[cfg(test)]
pub use fixture::Fixture;

//! End-to-end tests for the inter-core message link.

#[cfg(test)]
mod native_e2e;

#[cfg(test)]
mod power;

#[cfg(test)]
mod properties;

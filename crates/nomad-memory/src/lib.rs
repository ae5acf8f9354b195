// nomad-memory: in-memory storage adapter for the Nomad membership core.
//
// Enforces the schema's unique fields and serializes transactions, so it is
// a faithful stand-in for a relational backend in tests and local development.

pub mod adapter;

pub use adapter::MemoryAdapter;

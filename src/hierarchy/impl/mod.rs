mod memory;

pub use memory::InMemoryHierarchy;

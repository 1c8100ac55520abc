//! Integration tests for the built-in transformation set

mod builtin_fixes;

//! End-to-end tests over services wired by `Services::bootstrap`.

mod integration;

//! Cross-module checks for the bootstrap lifecycle

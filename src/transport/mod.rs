// MIT License - Copyright (c) 2026 Peter Wright
// Network helpers used around the protocol client

pub mod probe;

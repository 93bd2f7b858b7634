// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end tests that drive the full [`crate::Module`] façade rather
//! than a single pass in isolation, mirroring `qsc_qasm`'s own
//! `src/tests/` split from its per-pass unit tests.

mod sample_circuits;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod helpers;
pub mod llm_extraction_test;
pub mod persistence_test;
pub mod redis_queue_test;
pub mod redis_test;
pub mod worker_recovery_test;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod memory;
pub mod model_config_repo_impl;
pub mod node_repo_impl;
pub mod skill_repo_impl;
pub mod task_repo_impl;

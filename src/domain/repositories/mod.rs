// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 领域层的持久化抽象，具体实现由基础设施层提供：
/// - 任务仓库（task_repository）：任务记录的读写
/// - 节点仓库（node_repository）：节点心跳与状态
/// - 模型配置仓库（model_config_repository）、技能库（skill_repository）：只读解析
pub mod model_config_repository;
pub mod node_repository;
pub mod skill_repository;
pub mod task_repository;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 端到端测试模块
///
/// 提交任务、工作节点处理、结果写回的完整流程
pub mod complete_workflow_test;

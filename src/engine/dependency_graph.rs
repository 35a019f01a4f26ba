// ==========================================
// 组织架构管理系统 - 依赖图解析器
// ==========================================
// 职责: 在请求的实体类型子集上计算合法处理顺序
// 算法: Kahn 拓扑排序,就绪集按声明顺序稳定出队
// 口径: 仅必填外键构成排序边; 可选外键与自引用不参与排序,
//       但所有依赖都参与"子集缺失告警"
// ==========================================

use crate::domain::transfer::ValidationError;
use crate::domain::types::{EntityType, ErrorKind};
use std::collections::BTreeSet;

/// 依赖解析产物
#[derive(Debug)]
pub struct DependencyResolution {
    pub order: Vec<EntityType>,
    pub warnings: Vec<ValidationError>,
}

/// 通用 Kahn 拓扑排序
///
/// # 参数
/// - node_count: 节点数(节点以下标 0..n 表示,下标即声明顺序)
/// - edges: (from, to) 表示 from 必须先于 to; 自环被忽略
///
/// # 返回
/// - Ok(Vec<usize>): 合法顺序,并列时取下标最小者(确定性)
/// - Err(Vec<usize>): 队列耗尽后剩余的节点(存在环)
pub fn topo_sort(node_count: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>, Vec<usize>> {
    let mut in_degree = vec![0usize; node_count];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];

    for &(from, to) in edges {
        if from == to {
            continue;
        }
        adjacency[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..node_count).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(node_count);

    while let Some(&node) = ready.iter().next() {
        ready.remove(&node);
        order.push(node);
        for &next in &adjacency[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() < node_count {
        let remaining: Vec<usize> = (0..node_count).filter(|i| !order.contains(i)).collect();
        Err(remaining)
    } else {
        Ok(order)
    }
}

// ==========================================
// DependencyGraphResolver
// ==========================================
pub struct DependencyGraphResolver;

impl DependencyGraphResolver {
    pub fn new() -> Self {
        Self
    }

    /// 归一化请求集: 按声明顺序去重,None 视为全量
    pub fn normalize_requested(requested: Option<&[EntityType]>) -> Vec<EntityType> {
        match requested {
            None => EntityType::CANONICAL_ORDER.to_vec(),
            Some(subset) => EntityType::CANONICAL_ORDER
                .iter()
                .copied()
                .filter(|t| subset.contains(t))
                .collect(),
        }
    }

    /// 解析处理顺序
    ///
    /// # 返回
    /// - Ok(DependencyResolution): 顺序恰好覆盖请求集;
    ///   请求集中缺失的依赖以 WARNING 报告,不会被补进顺序
    /// - Err(ValidationError): CIRCULAR_REFERENCE(FATAL),消息列出剩余节点
    pub fn resolve(
        &self,
        requested: &[EntityType],
    ) -> Result<DependencyResolution, ValidationError> {
        let edges = Self::ordering_edges(requested);
        self.resolve_with_edges(requested, &edges)
    }

    /// 排序边: 必填外键 (目标 → 来源),仅保留两端都被请求的边
    fn ordering_edges(requested: &[EntityType]) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (idx, entity) in requested.iter().enumerate() {
            for fk in entity.descriptor().foreign_keys {
                if !fk.required || fk.target == *entity {
                    continue;
                }
                if let Some(target_idx) = requested.iter().position(|t| *t == fk.target) {
                    edges.push((target_idx, idx));
                }
            }
        }
        edges
    }

    /// 在显式给定的边上解析(测试可注入人工环)
    fn resolve_with_edges(
        &self,
        requested: &[EntityType],
        edges: &[(usize, usize)],
    ) -> Result<DependencyResolution, ValidationError> {
        let order = match topo_sort(requested.len(), edges) {
            Ok(indices) => indices.into_iter().map(|i| requested[i]).collect(),
            Err(remaining) => {
                let names: Vec<String> = remaining
                    .into_iter()
                    .map(|i| requested[i].to_string())
                    .collect();
                return Err(ValidationError::fatal(
                    ErrorKind::CircularReference,
                    format!("实体依赖图存在环,未能排序的类型: {}", names.join(", ")),
                ));
            }
        };

        // 子集缺失告警: 被请求类型的依赖(必填或可选)不在请求集中
        let mut warnings = Vec::new();
        for entity in requested {
            for fk in entity.descriptor().foreign_keys {
                if fk.target == *entity {
                    continue;
                }
                if !requested.contains(&fk.target) {
                    warnings.push(ValidationError::warning(
                        ErrorKind::ForeignKeyViolation,
                        Some(*entity),
                        None,
                        Some(fk.field),
                        format!(
                            "{} 依赖的 {} 不在本次请求中,引用将按已持久化数据解析",
                            entity, fk.target
                        ),
                    ));
                }
            }
        }

        Ok(DependencyResolution { order, warnings })
    }
}

impl Default for DependencyGraphResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_set_yields_canonical_order() {
        let resolver = DependencyGraphResolver::new();
        let requested = DependencyGraphResolver::normalize_requested(None);
        let resolution = resolver.resolve(&requested).unwrap();
        assert_eq!(resolution.order, EntityType::CANONICAL_ORDER.to_vec());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_subset_keeps_relative_order() {
        let resolver = DependencyGraphResolver::new();
        let requested = DependencyGraphResolver::normalize_requested(Some(&[
            EntityType::Assignment,
            EntityType::Unit,
            EntityType::UnitType,
        ]));
        let resolution = resolver.resolve(&requested).unwrap();
        assert_eq!(
            resolution.order,
            vec![EntityType::UnitType, EntityType::Unit, EntityType::Assignment]
        );
    }

    #[test]
    fn test_missing_dependency_warns_without_adding() {
        let resolver = DependencyGraphResolver::new();
        // 请求任职记录但不请求人员: 告警,不补进顺序
        let requested =
            DependencyGraphResolver::normalize_requested(Some(&[EntityType::Assignment]));
        let resolution = resolver.resolve(&requested).unwrap();

        assert_eq!(resolution.order, vec![EntityType::Assignment]);
        assert!(resolution
            .warnings
            .iter()
            .any(|w| w.message.contains("PERSON")));
        assert_eq!(resolution.warnings.len(), 3); // person / unit / job_title
    }

    #[test]
    fn test_synthetic_cycle_fails_with_remaining_nodes() {
        let resolver = DependencyGraphResolver::new();
        let requested = vec![EntityType::UnitType, EntityType::Unit];
        // 人工注入双向边构成环
        let edges = vec![(0, 1), (1, 0)];
        let err = resolver.resolve_with_edges(&requested, &edges).unwrap_err();

        assert_eq!(err.kind, ErrorKind::CircularReference);
        assert_eq!(err.severity, crate::domain::types::Severity::Fatal);
        assert!(err.message.contains("UNIT_TYPE"));
        assert!(err.message.contains("UNIT"));
    }

    #[test]
    fn test_topo_sort_self_edge_ignored() {
        let order = topo_sort(2, &[(0, 0), (0, 1)]).unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_topo_sort_tie_break_by_index() {
        // 0 和 2 同时就绪时应先出 0
        let order = topo_sort(3, &[(2, 1)]).unwrap();
        assert_eq!(order, vec![0, 2, 1]);
    }
}

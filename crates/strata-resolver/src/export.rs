//! Rendering a graph back into specification records.

use strata_config::{FileRecord, Record, TaskRecord, WorkflowSpec};
use strata_workflow::{NodeKind, WorkflowGraph};

/// Export `graph` as a specification, one record per node, ordered by name.
///
/// Predecessors keep their declaration order. Parsing the exported text and
/// building it again yields a graph with the same nodes, edges and fingerprints.
pub fn export_spec(graph: &WorkflowGraph) -> WorkflowSpec {
  let records = graph.sorted_nodes().into_iter().map(|node| {
    let predecessors: Vec<String> = graph
      .predecessors(&node.name)
      .into_iter()
      .map(str::to_string)
      .collect();

    match &node.kind {
      NodeKind::File { .. } => Record::File(FileRecord {
        names: vec![node.name.clone()],
        predecessors,
      }),
      NodeKind::Task {
        command,
        output_template,
        ..
      } => Record::Task(TaskRecord {
        name: node.name.clone(),
        predecessors,
        command: command.clone(),
        group: node.group.clone(),
        output_template: output_template.clone(),
      }),
    }
  });

  WorkflowSpec::from_records(records)
}

#[cfg(test)]
mod tests {
  use super::*;
  use strata_workflow::WorkflowNode;

  #[test]
  fn test_export_orders_records_by_name() {
    let mut g = WorkflowGraph::new();
    g.add_node(WorkflowNode::file("z")).unwrap();
    g.add_node(WorkflowNode::task("b", "cmd b", "main", "")).unwrap();
    g.add_node(WorkflowNode::file("a")).unwrap();
    g.add_edge("a", "b").unwrap();
    g.add_edge("b", "z").unwrap();

    let text = export_spec(&g).to_text();
    assert_eq!(text, "F<>a<>\nT<>b<>a<>cmd b<>main\nF<>z<>b\n");
  }

  #[test]
  fn test_export_keeps_template_and_group() {
    let mut g = WorkflowGraph::new();
    g.add_node(WorkflowNode::file("in1")).unwrap();
    g.add_node(WorkflowNode::task("t1", "echo *", "prep", "out_*")).unwrap();
    g.add_edge("in1", "t1").unwrap();

    let spec = export_spec(&g);
    let Record::Task(task) = &spec.records[1].record else {
      panic!("expected task record");
    };
    assert_eq!(task.group, "prep");
    assert_eq!(task.output_template, "out_*");
    assert_eq!(task.predecessors, vec!["in1".to_string()]);
  }
}

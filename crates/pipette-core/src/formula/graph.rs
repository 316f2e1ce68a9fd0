use std::collections::BTreeSet;

use tracing::debug;

use crate::formula::expr::identifiers;
use crate::formula::DependencyMatching;
use crate::model::TestResult;

/// Indices of the fields whose published variable `field`'s formula mentions.
///
/// With [`DependencyMatching::Substring`] this is a plain text search, so a
/// variable `n` is found inside `na + 1`.
pub fn dependencies_of(
    results: &[TestResult],
    field: usize,
    matching: DependencyMatching,
) -> Vec<usize> {
    let Some(formula) = results.get(field).and_then(TestResult::formula) else {
        return Vec::new();
    };

    let tokens: Vec<&str> = match matching {
        DependencyMatching::Substring => Vec::new(),
        DependencyMatching::Token => identifiers(formula)
            .into_iter()
            .filter(|id| !id.is_call)
            .map(|id| id.name)
            .collect(),
    };

    results
        .iter()
        .enumerate()
        .filter_map(|(idx, other)| {
            let variable = other.variable()?;
            let mentioned = match matching {
                DependencyMatching::Substring => formula.contains(variable),
                DependencyMatching::Token => tokens.contains(&variable),
            };
            mentioned.then_some(idx)
        })
        .collect()
}

/// Order in which fields must be visited so that every formula runs after
/// the fields it depends on.
///
/// Depth-first post-order over the fields in template order. Cycles are not
/// an error: the visited set cuts them off wherever they were entered.
pub fn dependency_order(results: &[TestResult], matching: DependencyMatching) -> Vec<usize> {
    let mut visited = vec![false; results.len()];
    let mut order = Vec::with_capacity(results.len());

    for idx in 0..results.len() {
        visit(results, idx, matching, &mut visited, &mut order);
    }

    debug!(?order, "dependency order");
    order
}

fn visit(
    results: &[TestResult],
    idx: usize,
    matching: DependencyMatching,
    visited: &mut [bool],
    order: &mut Vec<usize>,
) {
    if visited[idx] {
        return;
    }
    visited[idx] = true;

    for dep in dependencies_of(results, idx, matching) {
        visit(results, dep, matching, visited, order);
    }
    order.push(idx);
}

/// Groups of fields whose formulas depend on each other in a loop.
///
/// Each group is a strongly connected component of the dependency graph with
/// more than one field, or a single field whose formula mentions its own
/// variable. Groups and their members are in ascending index order.
pub fn dependency_cycles(results: &[TestResult], matching: DependencyMatching) -> Vec<Vec<usize>> {
    let edges: Vec<Vec<usize>> = (0..results.len())
        .map(|idx| dependencies_of(results, idx, matching))
        .collect();

    let mut tarjan = Tarjan {
        edges: &edges,
        index: vec![None; results.len()],
        lowlink: vec![0; results.len()],
        on_stack: vec![false; results.len()],
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };
    for idx in 0..results.len() {
        if tarjan.index[idx].is_none() {
            tarjan.connect(idx);
        }
    }

    let mut cycles: Vec<Vec<usize>> = tarjan
        .components
        .into_iter()
        .filter(|component| {
            component.len() > 1 || component.iter().any(|&idx| edges[idx].contains(&idx))
        })
        .map(|component| component.into_iter().collect::<BTreeSet<_>>().into_iter().collect())
        .collect();
    cycles.sort();
    cycles
}

struct Tarjan<'a> {
    edges: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn connect(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let edges = self.edges;
        for &w in &edges[v] {
            match self.index[w] {
                None => {
                    self.connect(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[v]) == self.index[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

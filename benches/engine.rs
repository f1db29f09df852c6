use callbox::config::{RouterConfig, TidyConfig};
use callbox::layout::{TidyEngine, route};
use callbox::{Anchor, BoxGraph, BoxId, BoxKind, BoxNode, Canvas, Rect};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// A call tree `depth` levels deep where every box calls `fanout` others,
/// laid out in overlapping rows so tidy has work to do.
fn call_tree(depth: usize, fanout: usize) -> (BoxGraph, Canvas, BoxId) {
    let mut graph = BoxGraph::new();
    let mut canvas = Canvas::new();
    let root = BoxId::from("n0");
    graph
        .add_box(BoxNode::new(root.clone(), BoxKind::FunctionBox))
        .expect("fresh id");
    canvas.insert(root.clone(), Rect::new(0.0, 0.0, 240.0, 120.0));

    let mut frontier = vec![root.clone()];
    let mut next_id = 1usize;
    for level in 1..=depth {
        let mut next = Vec::new();
        for (slot, parent) in frontier.iter().enumerate() {
            for k in 0..fanout {
                let id = BoxId::from(format!("n{next_id}"));
                next_id += 1;
                let column = (slot * fanout + k) as f32;
                graph
                    .add_box(BoxNode::new(id.clone(), BoxKind::FunctionBox).with_header(24.0))
                    .expect("fresh id");
                let rect = Rect::new(column * 180.0, level as f32 * 200.0, 240.0, 120.0);
                canvas.insert(id.clone(), rect);
                graph
                    .connect(&mut canvas, parent, &id, Anchor::BottomCenter)
                    .expect("tree edge");
                next.push(id);
            }
        }
        frontier = next;
    }
    (graph, canvas, root)
}

fn bench_routing(c: &mut Criterion) {
    let config = RouterConfig::default();
    let parent = Rect::new(0.0, 0.0, 300.0, 200.0);
    let cases = [
        ("right_detour", Rect::new(420.0, 60.0, 200.0, 100.0)),
        ("right_drop", Rect::new(420.0, 500.0, 200.0, 100.0)),
        ("left_detour", Rect::new(-400.0, -200.0, 200.0, 100.0)),
        ("left_drop", Rect::new(-400.0, 500.0, 200.0, 100.0)),
    ];
    let mut group = c.benchmark_group("route");
    for (name, child) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &child, |b, child| {
            b.iter(|| {
                let route = route(
                    black_box((150.0, 200.0)),
                    black_box((child.center_x(), child.top + 24.0)),
                    &parent,
                    child,
                    &config,
                );
                black_box(route.points.len());
            });
        });
    }
    group.finish();
}

fn bench_tidy_plan(c: &mut Criterion) {
    let engine = TidyEngine::new(TidyConfig::default());
    let mut group = c.benchmark_group("tidy_plan");
    for (depth, fanout) in [(3usize, 3usize), (4, 3), (5, 2)] {
        let (graph, canvas, root) = call_tree(depth, fanout);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{depth}x{fanout}")),
            &graph,
            |b, graph| {
                b.iter(|| {
                    let plan = engine
                        .plan(black_box(graph), &canvas, std::slice::from_ref(&root))
                        .expect("root has geometry");
                    black_box(plan.displacements.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_subtree(c: &mut Criterion) {
    let mut group = c.benchmark_group("subtree");
    for (depth, fanout) in [(4usize, 3usize), (6, 2), (3, 8)] {
        let (graph, _, root) = call_tree(depth, fanout);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{depth}x{fanout}")),
            &graph,
            |b, graph| {
                b.iter(|| {
                    let subtree = graph.get_subtree(black_box(&root)).expect("root exists");
                    black_box(subtree.len());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_routing, bench_tidy_plan, bench_subtree);
criterion_main!(benches);

//! Transform benchmarks
//!
//! Target: delete across a 500-block document in <5ms

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use folio_editor::{Mark, Node, Options, Schema, Selection, State};

fn generate_document(num_blocks: usize) -> State {
    State::new(Node::document((0..num_blocks).map(|i| {
        Node::block(
            "paragraph",
            [
                Node::leaf(&format!("Paragraph {} opens here, ", i)).with_key(format!("t{}", i)),
                Node::inline("link", [Node::leaf("a link")]),
                Node::leaf(" and it closes here."),
            ],
        )
    })))
}

/// Blocks whose texts were split apart, so every block needs repair
fn generate_fragmented_document(num_blocks: usize) -> State {
    State::new(Node::document((0..num_blocks).map(|i| {
        Node::block(
            "paragraph",
            (0..8).map(move |j| Node::leaf(&format!("{}:{} ", i, j))),
        )
    })))
}

fn insert_text(c: &mut Criterion) {
    let state = generate_document(500);
    let caret = Selection::collapsed("t250".into(), 4);

    c.bench_function("insert_text_500_blocks", |b| {
        b.iter(|| {
            let mut transform = state.transform();
            transform
                .insert_text_at_range(black_box(&caret), "typed", None, Options::default())
                .map(|transform| transform.document().clone())
        })
    });
}

fn delete_across_blocks(c: &mut Criterion) {
    let state = generate_document(500);
    let range = Selection::new("t10".into(), 3, "t490".into(), 5);

    c.bench_function("delete_across_500_blocks", |b| {
        b.iter(|| {
            let mut transform = state.transform();
            transform
                .delete_at_range(black_box(&range), Options::default())
                .map(|transform| transform.document().clone())
        })
    });
}

fn toggle_mark(c: &mut Criterion) {
    let state = generate_document(100);
    let range = Selection::new("t0".into(), 0, "t99".into(), 4);

    c.bench_function("toggle_mark_100_blocks", |b| {
        b.iter(|| {
            let mut transform = state.transform();
            transform
                .toggle_mark_at_range(black_box(&range), Mark::new("bold"), Options::default())
                .map(|transform| transform.operations().len())
        })
    });
}

fn normalize_document(c: &mut Criterion) {
    let state = generate_fragmented_document(200);
    let schema = Schema::core();

    c.bench_function("normalize_200_fragmented_blocks", |b| {
        b.iter(|| {
            let mut transform = state.transform();
            transform
                .normalize_with(black_box(&schema), None)
                .map(|transform| transform.operations().len())
        })
    });
}

criterion_group!(
    benches,
    insert_text,
    delete_across_blocks,
    toggle_mark,
    normalize_document
);
criterion_main!(benches);

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use core_types::{ComponentId, ElementReferenceId, EventHandlerId};
use render_tree::{
    DiffHost, EventCallback, Frame, FramePool, PoolConfig, RenderBatchBuilder, RenderTreeBuilder,
    compute_diff,
};

const SMALL_ROWS: usize = 16;
const LARGE_ROWS: usize = 2_000;
const OWNER: ComponentId = ComponentId(1);

#[derive(Default)]
struct NullHost {
    next: u64,
}

impl DiffHost for NullHost {
    fn instantiate_child(
        &mut self,
        _parent: ComponentId,
        _frames: &[Frame],
        _index: usize,
    ) -> ComponentId {
        self.next += 1;
        ComponentId(self.next as u32 + 1)
    }

    fn update_child_parameters(&mut self, _child: ComponentId, _frames: &[Frame], _index: usize) {}

    fn assign_event_handler(&mut self, _callback: &EventCallback) -> EventHandlerId {
        self.next += 1;
        EventHandlerId(self.next)
    }

    fn track_replaced_event_handler(&mut self, _old: EventHandlerId, _new: EventHandlerId) {}

    fn assign_element_reference(&mut self) -> ElementReferenceId {
        self.next += 1;
        ElementReferenceId(self.next)
    }
}

/// A table with one `<tr>` per row; `rotate` shifts row order to force moves.
fn make_table(pool: &mut FramePool, rows: usize, label: &str, rotate: usize) -> Vec<Frame> {
    let mut builder = RenderTreeBuilder::rent(pool, Some(OWNER));
    builder.open_element(0, "table");
    builder.add_attribute(1, "class", "grid");
    for i in 0..rows {
        let row = (i + rotate) % rows.max(1);
        // Rows share sequences, as a loop body would.
        builder.open_element(2, "tr");
        builder.add_attribute(3, "data-row", row as i64);
        builder.open_element(4, "td");
        builder.add_text(5, &format!("{label} {row}"));
        builder.close_element();
        builder.close_element();
    }
    builder.close_element();
    match builder.finish(pool) {
        Ok(sequence) => sequence.into_buffer(),
        Err(err) => panic!("bench table is well formed: {err}"),
    }
}

fn diff_once(old: &[Frame], new: &mut [Frame], batch: &mut RenderBatchBuilder) -> usize {
    let mut host = NullHost::default();
    batch.clear_for_next_batch();
    compute_diff(&mut host, batch, OWNER, old, new).map_or(0, |diff| diff.edits.len())
}

fn bench_initial_render(c: &mut Criterion) {
    let mut pool = FramePool::new(PoolConfig::default());
    let table = make_table(&mut pool, LARGE_ROWS, "cell", 0);
    let mut batch = RenderBatchBuilder::new();
    c.bench_function("bench_diff_initial_render_large", |b| {
        b.iter_batched(
            || table.clone(),
            |mut new| black_box(diff_once(&[], &mut new, &mut batch)),
            BatchSize::LargeInput,
        );
    });
}

fn bench_unchanged_rerender(c: &mut Criterion) {
    let mut pool = FramePool::new(PoolConfig::default());
    let old = make_table(&mut pool, LARGE_ROWS, "cell", 0);
    let new = make_table(&mut pool, LARGE_ROWS, "cell", 0);
    let mut batch = RenderBatchBuilder::new();
    c.bench_function("bench_diff_unchanged_large", |b| {
        b.iter_batched(
            || new.clone(),
            |mut new| black_box(diff_once(&old, &mut new, &mut batch)),
            BatchSize::LargeInput,
        );
    });
}

fn bench_text_changes(c: &mut Criterion) {
    let mut pool = FramePool::new(PoolConfig::default());
    let old = make_table(&mut pool, SMALL_ROWS, "before", 0);
    let new = make_table(&mut pool, SMALL_ROWS, "after", 0);
    let mut batch = RenderBatchBuilder::new();
    c.bench_function("bench_diff_text_changes_small", |b| {
        b.iter_batched(
            || new.clone(),
            |mut new| black_box(diff_once(&old, &mut new, &mut batch)),
            BatchSize::SmallInput,
        );
    });
}

fn bench_rotated_rows(c: &mut Criterion) {
    let mut pool = FramePool::new(PoolConfig::default());
    let old = make_table(&mut pool, LARGE_ROWS, "cell", 0);
    let new = make_table(&mut pool, LARGE_ROWS, "cell", 1);
    let mut batch = RenderBatchBuilder::new();
    c.bench_function("bench_diff_rotated_large", |b| {
        b.iter_batched(
            || new.clone(),
            |mut new| black_box(diff_once(&old, &mut new, &mut batch)),
            BatchSize::LargeInput,
        );
    });
}

fn bench_builder_with_pool(c: &mut Criterion) {
    let mut pool = FramePool::new(PoolConfig::default());
    c.bench_function("bench_build_pooled_small", |b| {
        b.iter(|| {
            let frames = make_table(&mut pool, SMALL_ROWS, "cell", 0);
            black_box(frames.len());
            pool.give_back(frames);
        });
    });
}

criterion_group!(
    benches,
    bench_initial_render,
    bench_unchanged_rerender,
    bench_text_changes,
    bench_rotated_rows,
    bench_builder_with_pool
);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pagecraft_document::{
    from_json, render, to_json, Breakpoint, ComponentRegistry, Document, Props, RenderOptions,
    RepairMode,
};

/// Page with `sections` containers, each holding a text and a button
fn build_page(registry: &ComponentRegistry, sections: usize) -> Document {
    let mut doc = Document::new(registry, "Container", &Props::new()).unwrap();
    let root = doc.tree().root_id().to_string();

    for i in 0..sections {
        let section = doc
            .create_node(registry, "Container", &Props::new(), &root, i)
            .unwrap()
            .value;
        doc.create_node(registry, "Text", &Props::new(), &section, 0).unwrap();
        doc.create_node(registry, "Button", &Props::new(), &section, 1).unwrap();
    }
    doc
}

fn serialize_page(c: &mut Criterion) {
    let registry = ComponentRegistry::builtin();
    let doc = build_page(&registry, 200);

    c.bench_function("serialize_600_nodes", |b| b.iter(|| to_json(black_box(&doc))));
}

fn deserialize_page(c: &mut Criterion) {
    let registry = ComponentRegistry::builtin();
    let json = to_json(&build_page(&registry, 200)).unwrap();

    c.bench_function("deserialize_600_nodes", |b| {
        b.iter(|| from_json(black_box(&json), &registry, RepairMode::Strict))
    });
}

fn move_heavy(c: &mut Criterion) {
    let registry = ComponentRegistry::builtin();
    let doc = build_page(&registry, 50);
    let root = doc.tree().root_id().to_string();
    let sections: Vec<String> = doc.tree().children(&root).to_vec();

    c.bench_function("move_buttons_between_sections", |b| {
        b.iter_batched(
            || doc.clone(),
            |mut doc| {
                for pair in sections.windows(2) {
                    let button = doc.tree().children(&pair[0]).last().cloned();
                    if let Some(button) = button {
                        let _ = doc.move_node(&registry, &button, &pair[1], 0);
                    }
                }
                doc
            },
            BatchSize::SmallInput,
        )
    });
}

fn render_mobile(c: &mut Criterion) {
    let registry = ComponentRegistry::builtin();
    let doc = build_page(&registry, 200);

    c.bench_function("render_mobile_600_nodes", |b| {
        b.iter(|| {
            render(
                black_box(doc.tree()),
                &registry,
                Breakpoint::Mobile,
                RenderOptions::default(),
            )
        })
    });
}

criterion_group!(benches, serialize_page, deserialize_page, move_heavy, render_mobile);
criterion_main!(benches);

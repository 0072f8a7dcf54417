/// Benchmarks for evaluator and scope resolution
///
/// Measures performance of:
/// - Scope wildcard matching
/// - Verbatim evaluation of the admin gate
/// - Resolved evaluation through the plugin identifier resolver

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plugin_access::config::PluginSettings;
use plugin_access::plugins::{self, InMemoryPluginStore, PluginInfo};
use plugin_access::scope::scope_matches;
use plugin_access::{Evaluator, Permission, PermissionSet, RequestContext, ScopeResolvers};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn bench_scope_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_matching");

    let cases = vec![
        ("exact", "plugins:id:clock", "plugins:id:clock"),
        ("global_wildcard", "*", "plugins:id:clock"),
        ("prefix_wildcard", "plugins:*", "plugins:id:clock"),
        ("miss", "plugins:class:core", "plugins:id:clock"),
    ];

    for (name, granted, target) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &(granted, target), |b, &(g, t)| {
            b.iter(|| scope_matches(black_box(g), black_box(t)))
        });
    }

    group.finish();
}

fn bench_admin_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("admin_gate");

    let reader: PermissionSet = vec![
        Permission::new("plugins:read", "plugins:class:core"),
        Permission::new("plugins:read", "plugins:class:external"),
    ]
    .into_iter()
    .collect();

    for enabled in [false, true] {
        let gate = plugins::admin_access_evaluator(&PluginSettings::new(enabled));
        group.bench_with_input(BenchmarkId::new("install_enabled", enabled), &gate, |b, gate| {
            b.iter(|| gate.evaluate(black_box(&reader)))
        });
    }

    group.finish();
}

fn bench_resolved_evaluation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let resolvers = rt.block_on(async {
        let store = Arc::new(InMemoryPluginStore::new());
        for i in 0..1000 {
            store.install(PluginInfo::external(format!("plugin-{}", i))).await;
        }
        let mut builder = ScopeResolvers::builder();
        plugins::register_resolvers(&mut builder, store).unwrap();
        builder.build()
    });

    let perms: PermissionSet = vec![Permission::new("plugins:read", "plugins:class:external")]
        .into_iter()
        .collect();
    let tree = Evaluator::any(vec![
        Evaluator::permission("plugins:write"),
        plugins::read_plugin_evaluator("plugin-500"),
    ]);

    c.bench_function("resolved_read_plugin", |b| {
        b.to_async(&rt).iter(|| async {
            let ctx = RequestContext::new();
            tree.evaluate_resolved(&ctx, black_box(&perms), 1, &resolvers)
                .await
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_scope_matching, bench_admin_gate, bench_resolved_evaluation);
criterion_main!(benches);

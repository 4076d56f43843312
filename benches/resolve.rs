//! Performance benchmarks for ussd-menu
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};
use ussd_menu::resolver::tokenize;
use ussd_menu::{
    Menu, MemorySessionStore, StateContext, StateOptions, Transition, UssdRequest,
};

/// Menu with `depth` chained states, each reached by `1`
fn chain_menu(depth: usize) -> Menu {
    let mut menu = Menu::new();
    menu.start_state(StateOptions::new().next("1", "s1"));
    for i in 1..=depth {
        menu.state(
            format!("s{}", i),
            StateOptions::new()
                .run(|ctx: StateContext| async move { ctx.con("Next") })
                .next("*^0$", "zero")
                .next("1", format!("s{}", i + 1))
                .default_next(format!("s{}", i)),
        );
    }
    menu
}

fn bench_tokenize(c: &mut Criterion) {
    let route = vec!["1"; 20].join("*");
    c.bench_function("tokenize (20 tokens)", |b| {
        b.iter(|| tokenize(&route));
    });
}

fn bench_run_direct(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("run_direct");
    for depth in [1, 10, 50] {
        let menu = chain_menu(depth);
        let route = vec!["1"; depth].join("*");
        group.bench_function(format!("{} tokens", depth), |b| {
            b.to_async(&rt).iter(|| async {
                menu.run(UssdRequest::new("bench", route.clone()))
                    .await
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_deferred_targets(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut menu = Menu::new();
    menu.start_state(
        StateOptions::new()
            .next_with("1", |_| Transition::deferred(async { Ok("done".to_string()) }))
            .next_with("2", |_| {
                Transition::callback(|done| {
                    done.ok("done".to_string());
                })
            }),
    )
    .state(
        "done",
        StateOptions::new().run(|ctx: StateContext| async move { ctx.end("Done") }),
    );

    c.bench_function("run (future target)", |b| {
        b.to_async(&rt)
            .iter(|| async { menu.run(UssdRequest::new("bench", "1")).await.unwrap() });
    });

    c.bench_function("run (callback target)", |b| {
        b.to_async(&rt)
            .iter(|| async { menu.run(UssdRequest::new("bench", "2")).await.unwrap() });
    });
}

fn bench_run_with_session(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut menu = Menu::new();
    menu.session_config(MemorySessionStore::new());
    menu.start_state(StateOptions::new().run(|ctx: StateContext| async move {
        if let Some(session) = ctx.session() {
            session.set("visits", 1).await?;
        }
        ctx.con("Welcome")
    }));

    c.bench_function("run (memory session)", |b| {
        b.to_async(&rt)
            .iter(|| async { menu.run(UssdRequest::new("bench", "")).await.unwrap() });
    });
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_run_direct,
    bench_deferred_targets,
    bench_run_with_session,
);
criterion_main!(benches);

//! Criterion benchmarks for URI generation and parsing.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use gadget_uri::{
    ConcatOptions, ConcatType, ConcatUri, ConcatUriManager, ConfigSnapshot, JsOptions, JsUri,
    JsUriManager, ProxyParams, ProxyUri, ProxyUriManager, Uri, config_key,
};

fn config(proxy_path: &str) -> Arc<ConfigSnapshot> {
    Arc::new(
        ConfigSnapshot::builder()
            .set("default", config_key::PROXY_HOST, "proxy.example.com")
            .set("default", config_key::PROXY_PATH, proxy_path)
            .set("default", config_key::CONCAT_HOST, "concat.example.com")
            .set("default", config_key::CONCAT_PATH, "/gadgets/concat")
            .set("default", config_key::CONCAT_JS_SPLIT_TOKEN, "_js")
            .set("default", config_key::JS_HOST, "//js.example.com")
            .set("default", config_key::JS_PATH, "/gadgets/js")
            .build(),
    )
}

/// Benchmark: Uri::parse with varying URI shapes
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    let test_cases = [
        ("relative", "images/logo.png"),
        ("absolute", "http://a.com/images/logo.png"),
        (
            "proxy_query",
            "//proxy.example.com/gadgets/proxy?container=default&debug=0&nocache=0&url=http%3A%2F%2Fa.com%2Fx.png",
        ),
        (
            "proxy_chained",
            "//proxy.example.com/gadgets/proxy/&s&container=default&debug=0&nocache=0&e/http://a.com/x.png",
        ),
        (
            "rendering",
            "http://render.example.com/gadgets/ifr?url=http%3A%2F%2Fg.com%2Fg.xml&container=default&view=canvas#up_color=red&st=abc",
        ),
    ];

    for (name, uri) in test_cases {
        group.throughput(Throughput::Bytes(uri.len() as u64));
        group.bench_with_input(BenchmarkId::new("uri", name), &uri, |b, uri| {
            b.iter(|| Uri::parse(black_box(uri)));
        });
    }

    group.finish();
}

/// Benchmark: proxy make and process, query and chained syntax
fn bench_proxy(c: &mut Criterion) {
    let mut group = c.benchmark_group("proxy");

    for (name, path) in [
        ("query", "/gadgets/proxy"),
        ("chained", "/gadgets/proxy/%chained_params%"),
    ] {
        let manager = ProxyUriManager::new(config(path));
        let input = ProxyUri::new(
            Uri::parse("http://a.com/images/logo.png?size=large").expect("valid test URI"),
            ProxyParams::new("default").with_gadget("http://g.com/g.xml"),
        );
        group.bench_with_input(BenchmarkId::new("make", name), &input, |b, input| {
            b.iter(|| manager.make(std::slice::from_ref(black_box(input)), None));
        });

        let uri = manager
            .make(std::slice::from_ref(&input), None)
            .expect("configured")
            .remove(0);
        group.bench_with_input(BenchmarkId::new("process", name), &uri, |b, uri| {
            b.iter(|| manager.process(black_box(uri)));
        });
    }

    group.finish();
}

/// Benchmark: concat batching with growing batch sizes
fn bench_concat(c: &mut Criterion) {
    let mut group = c.benchmark_group("concat");
    let manager = ConcatUriManager::new(config("/gadgets/proxy"), ConcatOptions::default());

    for size in [1usize, 10, 100] {
        let batch: Vec<Uri> = (0..size)
            .map(|i| Uri::parse(&format!("http://a.com/scripts/lib{i}.js")).expect("valid test URI"))
            .collect();
        let input = [ConcatUri::new(
            ConcatType::Js,
            batch,
            ProxyParams::new("default"),
        )];

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("adjacent", size), &input, |b, input| {
            b.iter(|| manager.make(black_box(input), true));
        });
        group.bench_with_input(BenchmarkId::new("split", size), &input, |b, input| {
            b.iter(|| manager.make(black_box(input), false));
        });
    }

    group.finish();
}

/// Benchmark: feature bundle URI round trip
fn bench_js(c: &mut Criterion) {
    let mut group = c.benchmark_group("js");
    let manager = JsUriManager::new(config("/gadgets/proxy"), JsOptions::default());

    let js = JsUri::new("default", ["core", "rpc", "dynamic-height", "views"])
        .with_loaded_libs(["core"])
        .with_onload("init");
    group.bench_function("make", |b| {
        b.iter(|| manager.make_extern_js_uri(black_box(&js)));
    });

    let uri = manager.make_extern_js_uri(&js).expect("configured");
    group.bench_function("process", |b| {
        b.iter(|| manager.process_extern_js_uri(black_box(&uri)));
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_proxy, bench_concat, bench_js);
criterion_main!(benches);

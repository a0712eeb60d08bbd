use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rtcl::list::{merge, split_list};
use rtcl::pattern::match_glob;
use rtcl::{is_complete, Parse};

const SCRIPT: &str = r#"
# configuration preamble
set base /var/log
set pattern {*.log}
foreach f [glob -nocomplain $base/$pattern] {
    if {[file size $f] > 1048576} {
        puts "rotating $f"
        exec gzip -- $f
    }
}
proc greet {who {greeting hello}} {
    return "$greeting, $who!"
}
greet {*}{world moon}
"#;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_command", |b| {
        b.iter(|| {
            let mut parse = Parse::new(black_box(SCRIPT));
            parse.parse_command(false).unwrap();
            black_box(parse.tokens().len())
        })
    });

    c.bench_function("is_complete", |b| {
        b.iter(|| is_complete(black_box(SCRIPT)))
    });
}

fn bench_list(c: &mut Criterion) {
    let elems: Vec<String> = (0..64)
        .map(|i| format!("element {i} with spaces and {{braces}}"))
        .collect();
    let merged = merge(&elems);

    c.bench_function("list_merge", |b| b.iter(|| merge(black_box(&elems))));
    c.bench_function("list_split", |b| {
        b.iter(|| split_list(black_box(&merged)).unwrap())
    });
}

fn bench_glob(c: &mut Criterion) {
    let text = "2026-08-29T12:00:00 server42 app[1234]: request finished in 12ms";
    c.bench_function("glob_match", |b| {
        b.iter(|| match_glob(black_box(text), "*app\\[*\\]: request*", false))
    });
}

criterion_group!(benches, bench_parse, bench_list, bench_glob);
criterion_main!(benches);

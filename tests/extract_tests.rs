//! Integration tests for the extraction pipeline.

use spf_extract::extract::Extractor;
use spf_extract::frontend;
use spf_extract::ir::notation::{parse_relation, parse_set};
use spf_extract::ir::Computation;
use spf_extract::utils::errors::ExtractErrorKind;
use spf_extract::utils::location::SourceMap;
use spf_extract::extract_function;

const MATRIX_ADD: &str = r#"
void matrix_add(int a, int b, int x[a][b], int y[a][b], int sum[a][b]) {
    int i;
    int j;
    for (i = 0; i < a; i++) {
        for (j = 0; j < b; j++) {
            sum[i][j] = x[i][j] + y[i][j];
        }
    }
}
"#;

const CSR_SPMV: &str = r#"
void spmv(int N, int NNZ, int rowptr[N], int col[NNZ], double A[NNZ],
          double x[N], double product[N]) {
    int i;
    int k;
    for (i = 0; i < N; i++) {
        for (k = rowptr[i]; k < rowptr[i + 1]; k++) {
            product[i] += A[k] * x[col[k]];
        }
    }
}
"#;

const FORWARD_SOLVE: &str = r#"
int forward_solve(int n, int l[n][n], double b[n], double x[n]) {
    int i;
    for (i = 0; i < n; i++) {
        x[i] = b[i];
    }
    int j;
    for (j = 0; j < n; j++) {
        x[j] /= l[j][j];
        for (i = j + 1; i < n; i++) {
            if (l[i][j] > 0) x[i] -= l[i][j] * x[j];
        }
    }
    return 0;
}
"#;

fn extract(source: &str, entry: &str) -> Computation {
    extract_function(source, entry).expect("extraction failed")
}

#[test]
fn matrix_add_emits_expected_ir() {
    let comp = extract(MATRIX_ADD, "matrix_add");
    assert_eq!(comp.name(), "matrix_add");
    assert_eq!(comp.statements().len(), 3);

    let decl = &comp.statements()[0];
    assert_eq!(decl.source_code(), "int i;");
    assert_eq!(decl.iteration_space(), "{[0]}");
    assert_eq!(decl.execution_schedule(), "{[0]->[0]}");

    let body = &comp.statements()[2];
    assert_eq!(body.source_code(), "sum[i][j] = x[i][j] + y[i][j];");
    assert_eq!(
        body.iteration_space(),
        "{[i,j]: 0<=i and i<a and 0<=j and j<b}"
    );
    assert_eq!(body.execution_schedule(), "{[i,j]->[2,i,0,j,0]}");
    assert_eq!(
        body.reads(),
        &[
            ("x".to_string(), "{[i,j]->[i,j]}".to_string()),
            ("y".to_string(), "{[i,j]->[i,j]}".to_string()),
        ]
    );
    assert_eq!(
        body.writes(),
        &[("sum".to_string(), "{[i,j]->[i,j]}".to_string())]
    );
    assert!(comp.is_complete());
}

#[test]
fn csr_spmv_uniformizes_indirect_access() {
    let comp = extract(CSR_SPMV, "spmv");
    let body = comp.statements().last().unwrap();

    assert_eq!(
        body.iteration_space(),
        "{[i,k]: 0<=i and i<N and rowptr(i)<=k and k<rowptr(i + 1)}"
    );

    let x_read = body
        .reads()
        .iter()
        .find(|(name, _)| name == "x")
        .expect("no read of x");
    assert_eq!(x_read.1, "{[i,k]->[_rVar0]: _rVar0 = col(k)}");

    // the read-modify-write target is both read and written
    assert!(body.reads().iter().any(|(name, _)| name == "product"));
    assert_eq!(
        body.writes(),
        &[("product".to_string(), "{[i,k]->[i]}".to_string())]
    );
}

#[test]
fn forward_solve_guard_constraint() {
    let comp = extract(FORWARD_SOLVE, "forward_solve");
    let guarded = comp
        .statements()
        .iter()
        .find(|s| s.source_code().contains("-="))
        .expect("guarded statement not found");

    assert_eq!(
        guarded.iteration_space(),
        "{[j,i]: 0<=j and j<n and j + 1<=i and i<n and l(i,j)>0}"
    );
    assert_eq!(comp.return_values(), &["0".to_string()]);
}

#[test]
fn reserved_math_call_is_opaque() {
    let comp = extract(
        "void f(double N, double r) {
            r = sqrt(N);
        }",
        "f",
    );
    let stmt = &comp.statements()[0];
    assert_eq!(stmt.reads(), &[("N".to_string(), "{[0]->[0]}".to_string())]);
    // no sub-computation statements were spliced in
    assert_eq!(comp.statements().len(), 1);
}

#[test]
fn user_call_is_inlined_with_surrogate_read() {
    let source = r#"
int inner(int v, int c) {
    int res = v * c;
    return res;
}
void outer(int x) {
    int y = 0;
    for (int i = 0; i < 3; i++) {
        y = inner(x, 3);
    }
}
"#;
    let comp = extract(source, "outer");

    // caller declaration first
    assert_eq!(comp.statements()[0].source_code(), "int y = 0;");
    assert_eq!(comp.statements()[0].execution_schedule(), "{[0]->[0]}");

    // parameter bindings and the callee body, rebased under the loop
    assert_eq!(comp.statements()[1].source_code(), "int v__0 = x;");
    assert_eq!(
        comp.statements()[1].execution_schedule(),
        "{[i]->[1,i,0]}"
    );
    assert_eq!(comp.statements()[2].source_code(), "int c__0 = 3;");
    assert_eq!(
        comp.statements()[3].source_code(),
        "int res__0 = v__0 * c__0;"
    );
    assert_eq!(
        comp.statements()[3].iteration_space(),
        "{[i]: 0<=i and i<3}"
    );

    // the caller statement consumes the surrogate
    let host = &comp.statements()[4];
    assert_eq!(host.source_code(), "y = res__0;");
    assert_eq!(host.execution_schedule(), "{[i]->[1,i,3]}");
    assert!(host.reads().iter().any(|(name, _)| name == "res__0"));
    assert!(comp.is_complete());
}

#[test]
fn statement_position_call_emits_no_host_statement() {
    let source = r#"
void touch(int v) {
    int t = v;
}
void f(int x) {
    touch(x);
}
"#;
    let comp = extract(source, "f");
    // one binding plus the callee body, nothing else
    assert_eq!(comp.statements().len(), 2);
    assert_eq!(comp.statements()[0].source_code(), "int v__0 = x;");
    assert_eq!(comp.statements()[1].source_code(), "int t__0 = v__0;");
}

#[test]
fn shadowing_declaration_fails() {
    let err = extract_function(
        "void f(int n) {
            int x;
            int i;
            for (i = 0; i < n; i++) {
                int x;
            }
        }",
        "f",
    )
    .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("shadows"), "unexpected error: {}", msg);
}

#[test]
fn loop_invariant_modification_fails() {
    let err = extract_function(
        "void f(int n, int a[n]) {
            int i;
            for (i = 0; i < n; i++) {
                n = 0;
            }
        }",
        "f",
    )
    .unwrap_err();
    assert!(err.to_string().contains("loop-invariant"));
}

#[test]
fn disequality_condition_fails() {
    let err = extract_function(
        "void f(int n, int a[n]) {
            int i;
            for (i = 0; i != n; i++) {
                a[i] = 0;
            }
        }",
        "f",
    )
    .unwrap_err();
    assert!(err.to_string().contains("Not-equal"));
}

// ---- universal invariants ----

#[test]
fn access_arity_matches_iteration_space() {
    for (source, entry) in [
        (MATRIX_ADD, "matrix_add"),
        (CSR_SPMV, "spmv"),
        (FORWARD_SOLVE, "forward_solve"),
    ] {
        let comp = extract(source, entry);
        for stmt in comp.statements() {
            let space = parse_set(stmt.iteration_space()).unwrap();
            for (_, relation) in stmt.reads().iter().chain(stmt.writes()) {
                let rel = parse_relation(relation).unwrap();
                assert_eq!(
                    rel.inputs, space.iterators,
                    "arity mismatch in {} for {}",
                    entry, relation
                );
            }
        }
    }
}

#[test]
fn schedules_are_lex_monotone() {
    for (source, entry) in [
        (MATRIX_ADD, "matrix_add"),
        (CSR_SPMV, "spmv"),
        (FORWARD_SOLVE, "forward_solve"),
    ] {
        let comp = extract(source, entry);
        let mut previous: Option<Vec<String>> = None;
        for stmt in comp.statements() {
            let outputs = parse_relation(stmt.execution_schedule()).unwrap().outputs;
            // compare only the constant prefix; iterator entries are
            // incomparable and count as ties
            if let Some(prev) = &previous {
                let ordered = prev.iter().zip(&outputs).all(|(a, b)| {
                    a == b || a.parse::<usize>().and_then(|x| b.parse::<usize>().map(|y| (x, y)))
                        .map(|(x, y)| x <= y)
                        .unwrap_or(true)
                });
                assert!(ordered, "schedule regression in {}: {:?} then {:?}", entry, prev, outputs);
            }
            previous = Some(outputs);
        }
    }
}

#[test]
fn fresh_names_are_unique_and_guarded() {
    let source = r#"
void f(int n, int col[n], int row[n], double x[n], double y[n]) {
    int i;
    for (i = 0; i < n; i++) {
        x[col[i]] = y[row[i]];
    }
}
"#;
    let comp = extract(source, "f");
    let stmt = comp.statements().last().unwrap();

    let mut fresh = Vec::new();
    for (_, relation) in stmt.reads().iter().chain(stmt.writes()) {
        let rel = parse_relation(relation).unwrap();
        for output in &rel.outputs {
            if output.starts_with("_rVar") {
                assert!(
                    rel.guards.iter().any(|g| g.starts_with(&format!("{} =", output))),
                    "fresh variable {} has no guard in {}",
                    output,
                    relation
                );
                fresh.push(output.clone());
            }
        }
    }
    assert_eq!(fresh.len(), 2);
    fresh.sort();
    fresh.dedup();
    assert_eq!(fresh.len(), 2, "fresh names were reused");
}

// ---- round trips ----

#[test]
fn re_extraction_is_byte_identical() {
    let first = extract(CSR_SPMV, "spmv").print_info();
    let second = extract(CSR_SPMV, "spmv").print_info();
    assert_eq!(first, second);
}

#[test]
fn inlining_re_extraction_is_byte_identical() {
    let source = r#"
int inner(int v) {
    int res = v + 1;
    return res;
}
void outer(int x) {
    int y = inner(x);
}
"#;
    let first = extract(source, "outer").print_info();
    let second = extract(source, "outer").print_info();
    assert_eq!(first, second);
}

// ---- boundaries ----

#[test]
fn subscript_rank_boundary() {
    let deep = |rank: usize| {
        let mut subscripts = String::new();
        for _ in 0..rank {
            subscripts.push_str("[0]");
        }
        format!(
            "void f(int n, int a[n]) {{ int t = a{}; }}",
            subscripts
        )
    };

    assert!(extract_function(&deep(50), "f").is_ok());
    let err = extract_function(&deep(51), "f").unwrap_err();
    assert!(err.to_string().contains("maximum"));
}

#[test]
fn increment_forms_boundary() {
    let with_inc = |inc: &str| {
        format!(
            "void f(int n, int a[n]) {{
                for (int i = 0; i < n; {}) {{ a[i] = 0; }}
            }}",
            inc
        )
    };

    for inc in ["i++", "++i", "i += 1", "i -= -1", "i = i + 1", "i = 1 + i"] {
        assert!(extract_function(&with_inc(inc), "f").is_ok(), "{}", inc);
    }
    for inc in ["i += 2", "i--", "i = i - 1", "i = 2 + i"] {
        let err = extract_function(&with_inc(inc), "f").unwrap_err();
        assert!(err.to_string().contains("increment"), "{}", inc);
    }
}

// ---- error categories ----

#[test]
fn unsupported_statements_fail_by_name() {
    for (snippet, kind) in [
        ("while (n > 0) { n = n - 1; }", "while"),
        ("do { n = n - 1; } while (n > 0);", "do-while"),
        ("{ n = 0; }", "block"),
    ] {
        let source = format!("void f(int n) {{ {} }}", snippet);
        let err = extract_function(&source, "f").unwrap_err();
        assert!(
            err.to_string().contains(kind),
            "error for '{}' does not name the construct: {}",
            snippet,
            err
        );
    }
}

#[test]
fn missing_entry_point_fails() {
    let err = extract_function("void f(int n) { n = 0; }", "g").unwrap_err();
    assert!(err.to_string().contains("'g'"));
}

#[test]
fn complex_return_fails() {
    let err = extract_function("int f(int n) { return n + 1; }", "f").unwrap_err();
    assert!(err.to_string().contains("too complex"));
}

#[test]
fn extractor_memoizes_sub_computations() {
    let source = r#"
int inner(int v) {
    int res = v + 1;
    return res;
}
void outer(int x) {
    int a = inner(x);
    int b = inner(x);
}
"#;
    let program = frontend::parse(source).unwrap();
    let map = SourceMap::new(source.to_string());
    let mut extractor = Extractor::new(&program, &map);
    let comp = extractor.extract("outer").unwrap();

    assert_eq!(extractor.sub_computations().len(), 1);
    // two splices, distinct rename suffixes
    assert!(comp.statements().iter().any(|s| s.source_code() == "int a = res__0;"));
    assert!(comp.statements().iter().any(|s| s.source_code() == "int b = res__1;"));
}

#[test]
fn extract_error_kinds_are_categorized() {
    let cases: Vec<(&str, ExtractErrorKind)> = vec![
        (
            "void f(int n) { while (n > 0) { n = n - 1; } }",
            ExtractErrorKind::UnsupportedConstruct,
        ),
        (
            "void f(int n, int a[n]) { for (int i = 0; i < n; i += 2) { a[i] = 0; } }",
            ExtractErrorKind::MalformedFor,
        ),
        (
            "void f(int n, int a[n]) { for (int i = 0; i < n; i++) { n = 0; } }",
            ExtractErrorKind::SemanticViolation,
        ),
        ("void f(int x) { g(x); }", ExtractErrorKind::Resolution),
    ];

    for (source, expected) in cases {
        let program = frontend::parse(source).unwrap();
        let map = SourceMap::new(source.to_string());
        let mut extractor = Extractor::new(&program, &map);
        let err = extractor.extract("f").unwrap_err();
        assert_eq!(err.kind, expected, "wrong category for: {}", source);
    }
}

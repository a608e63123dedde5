use criterion::{criterion_group, criterion_main, Criterion};
use sheetsql_core::types::ScalarValue;
use sheetsql_grid::{Workbook, Worksheet};
use sheetsql_sql::executor::SqlExecutor;
use sheetsql_sql::parse_sql;

fn states_workbook(rows: usize) -> Workbook {
    let mut grid: Vec<Vec<ScalarValue>> = vec![vec![
        "State".into(),
        "Ranking".into(),
        "Population".into(),
    ]];
    for i in 0..rows {
        grid.push(vec![
            format!("State {i}").into(),
            (i as i64).into(),
            ((i as i64) * 1_000).into(),
        ]);
    }
    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Worksheet::from_rows("States", grid))
        .expect("add sheet");
    workbook
}

fn sql_parse_bench(c: &mut Criterion) {
    c.bench_function("sql_parse", |b| {
        b.iter(|| {
            let _ = parse_sql("SELECT * FROM States WHERE State LIKE 'North%';");
        })
    });
}

fn sql_end_to_end_bench(c: &mut Criterion) {
    let executor = SqlExecutor::new();
    c.bench_function("sql_end_to_end", |b| {
        b.iter(|| {
            let mut workbook = states_workbook(200);
            let stmts =
                parse_sql("INSERT INTO States (State, Ranking) VALUES ('Maine', 41);").expect("parse");
            executor.execute(&mut workbook, &stmts[0]).expect("insert");
            let stmts = parse_sql("UPDATE States SET Population = 0 WHERE Ranking > 150;").expect("parse");
            executor.execute(&mut workbook, &stmts[0]).expect("update");
            let stmts = parse_sql("SELECT State FROM States WHERE State LIKE 'State 1%' ORDER BY Ranking DESC LIMIT 10;")
                .expect("parse");
            let _ = executor.execute(&mut workbook, &stmts[0]).expect("select");
            let stmts = parse_sql("DELETE FROM States WHERE Ranking < 50;").expect("parse");
            executor.execute(&mut workbook, &stmts[0]).expect("delete");
        })
    });
}

criterion_group!(sql_benches, sql_parse_bench, sql_end_to_end_bench);
criterion_main!(sql_benches);

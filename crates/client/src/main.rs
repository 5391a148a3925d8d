use arrow::util::pretty::pretty_format_batches;
use arrow_schema::DataType;
use tdf_client::{
    col, eq, lit_bool, lit_f64, lit_i32, lit_i64, lit_str, sum, DataFrame, SessionContext,
};
use tdf_common::EngineConfig;
use tdf_planner::{pretty_print, Expr};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let opts = parse_opts(&args)?;

    let config = match &opts.config {
        Some(path) => EngineConfig::load_json(path)?,
        None => EngineConfig::from_env()?,
    };
    let ctx = SessionContext::new(config);
    let df = build_query(&ctx, &opts)?;

    if opts.explain {
        println!("== logical plan ==");
        print!("{}", pretty_print(&df.logical_plan()?, 0));
        println!("== optimized logical plan ==");
        print!("{}", pretty_print(&df.optimized_logical_plan()?, 0));
        println!("== physical plan ==");
        print!("{}", df.physical_plan()?.display_indent());
    }

    let batches = futures::executor::block_on(df.collect())?;
    if batches.iter().all(|b| b.num_rows() == 0) {
        println!("OK: 0 rows");
    } else {
        println!("{}", pretty_format_batches(&batches)?);
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct QueryOpts {
    path: String,
    filter_eq: Option<(String, String)>,
    group_by: Option<String>,
    sum: Option<String>,
    explain: bool,
    config: Option<String>,
}

fn parse_opts(args: &[String]) -> Result<QueryOpts, Box<dyn std::error::Error>> {
    let mut opts = QueryOpts::default();
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--filter-eq" => {
                i += 1;
                let raw = args.get(i).ok_or("missing value for --filter-eq")?;
                let (column, value) = raw
                    .split_once('=')
                    .ok_or("--filter-eq expects col=value")?;
                opts.filter_eq = Some((column.to_string(), value.to_string()));
            }
            "--group-by" => {
                i += 1;
                opts.group_by = Some(args.get(i).cloned().ok_or("missing value for --group-by")?);
            }
            "--sum" => {
                i += 1;
                opts.sum = Some(args.get(i).cloned().ok_or("missing value for --sum")?);
            }
            "--config" => {
                i += 1;
                opts.config = Some(args.get(i).cloned().ok_or("missing value for --config")?);
            }
            "--explain" => opts.explain = true,
            other if other.starts_with("--") => {
                return Err(format!("unknown argument: {other}").into());
            }
            path => {
                if !opts.path.is_empty() {
                    return Err(format!("unexpected extra path: {path}").into());
                }
                opts.path = path.to_string();
            }
        }
        i += 1;
    }
    if opts.path.is_empty() {
        return Err("missing parquet file path".into());
    }
    if opts.group_by.is_some() && opts.sum.is_none() {
        return Err("--group-by requires --sum".into());
    }
    Ok(opts)
}

fn build_query(
    ctx: &SessionContext,
    opts: &QueryOpts,
) -> Result<DataFrame, Box<dyn std::error::Error>> {
    let mut df = ctx.parquet(&opts.path, None)?;
    let schema = df.logical_plan()?.schema()?;

    if let Some((column, raw)) = &opts.filter_eq {
        let field = schema
            .field_with_name(column)
            .map_err(|_| format!("unknown filter column: {column}"))?;
        let value = typed_literal(field.data_type(), raw)?;
        df = df.filter(eq(col(column), value));
    }
    if let Some(column) = &opts.sum {
        let groups = opts.group_by.iter().map(|g| col(g)).collect();
        df = df.aggregate(groups, vec![sum(col(column))]);
    }
    Ok(df)
}

fn typed_literal(dt: &DataType, raw: &str) -> Result<Expr, Box<dyn std::error::Error>> {
    Ok(match dt {
        DataType::Int32 => lit_i32(raw.parse()?),
        DataType::Int64 => lit_i64(raw.parse()?),
        DataType::Float64 => lit_f64(raw.parse()?),
        DataType::Boolean => lit_bool(raw.parse()?),
        DataType::Utf8 => lit_str(raw),
        other => return Err(format!("cannot filter on {other} columns").into()),
    })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  tdf <file.parquet> [--filter-eq col=value] [--group-by col] [--sum col]");
    eprintln!("      [--explain] [--config PATH]");
    eprintln!();
    eprintln!("Logging is configured through RUST_LOG (default: warn).");
}

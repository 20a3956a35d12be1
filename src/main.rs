//! # Colflow CLI
//!
//! Usage:
//!   colflow article.html --width 320 --height 480 -o columns.html
//!   cat article.html | colflow --json
//!   colflow --example > article.html
//!
//! Heights come from the estimating oracle. Set `RUST_LOG=colflow=debug` to
//! watch the columns being filled.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use colflow::image_loader::SourceImageLoader;
use colflow::render::{self, ColumnRenderer};
use colflow::{ColumnGeometry, EstimatingOracle, FlowConfig, FlowError};

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_article());
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), FlowError> {
    let input_path = args.get(1).filter(|a| !a.starts_with('-'));
    let input = match input_path {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let config = match flag_value(args, "--config") {
        Some(path) => FlowConfig::from_json(&fs::read_to_string(path)?)?,
        None => FlowConfig::default(),
    };
    let width = number_flag(args, "--width").unwrap_or(320.0);
    let height = number_flag(args, "--height").unwrap_or(480.0);
    let margin = number_flag(args, "--margin").unwrap_or(0.0);
    let geometry = ColumnGeometry::new(width, height).with_margin(margin);

    let loader = match input_path.and_then(|p| Path::new(p).parent()) {
        Some(dir) => SourceImageLoader::with_base_dir(dir),
        None => SourceImageLoader::default(),
    };

    let mut renderer = ColumnRenderer::new(config, geometry, EstimatingOracle::default());
    renderer.load(&input);
    let event = render::run(&mut renderer, &loader)?;

    let output = if args.iter().any(|a| a == "--json") {
        serde_json::to_string_pretty(renderer.container()).map_err(FlowError::Output)?
    } else {
        html_page(renderer.container())
    };

    match flag_value(args, "-o") {
        Some(path) => {
            fs::write(path, &output)?;
            eprintln!(
                "✓ Written {} columns ({} wide) to {}",
                event.columns, event.width, path
            );
        }
        None => print!("{}", output),
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn number_flag(args: &[String], flag: &str) -> Option<f64> {
    flag_value(args, flag).and_then(|v| v.parse().ok())
}

fn html_page(container: &colflow::Container) -> String {
    let id = container.selector.trim_start_matches('#');
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n#{id} {{ width: {width}px; }}\n#{id} > div {{ float: left; overflow: hidden; }}\n</style>\n</head>\n<body>\n<div id=\"{id}\">\n{columns}\n</div>\n</body>\n</html>\n",
        id = id,
        width = container.width,
        columns = container.to_html()
    )
}

fn example_article() -> &'static str {
    r##"<h1>Reading in Columns</h1>
<p>Long lines are tiring. The eye has to travel far to the right and then find
its way back to the start of the next line, and on a wide screen it often lands
on the wrong one. Newspapers solved this long ago by setting text in narrow
columns that sit side by side, so a reader moves down one column and then
across to the top of the next.</p>
<h2>What the engine does</h2>
<p>The markup is cut into top-level blocks. Each column is filled block by
block until the next one would overflow, and then the overflowing block is
opened up and filled word by word. Short runs of words are never left alone at
the top or bottom of a column.</p>
<ol>
<li>Headings never end a column.</li>
<li>Ordered lists keep counting in the next column.</li>
<li>List items, table rows and div blocks are never split.</li>
<li>Every column takes at least one block, so the layout always ends.</li>
</ol>
<h2>Images</h2>
<p>Images are given the column width. Once they have loaded, any column that
grew too tall because of them is laid out again, once.</p>
<p>That is all there is to it. Resize the window and the columns flow again,
from the first word to the last.</p>
"##
}

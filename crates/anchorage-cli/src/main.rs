mod app;

use anchorage_config::Config;
use anchorage_engine::io;
use anyhow::Result;
use app::{App, AnnotationStatus};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use std::{
    env,
    fs::OpenOptions,
    io::{Stdout, stdout},
    path::PathBuf,
    process,
};

fn init_logging(config: &Config) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    // Logging to stderr would draw over the terminal UI
    if let Some(log_file) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(log_file)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let (document_path, annotations_path) = match args.as_slice() {
        [_, document] => {
            let document = PathBuf::from(document);
            let annotations = io::default_annotations_path(&document);
            (document, annotations)
        }
        [_, document, annotations] => (PathBuf::from(document), PathBuf::from(annotations)),
        _ => {
            eprintln!("Usage: {} <document.md> [annotations.json]", args[0]);
            process::exit(1);
        }
    };

    let config = match Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Fix or remove {}", Config::config_path().display());
            process::exit(1);
        }
    };
    init_logging(&config)?;
    log::info!(
        "anchorage-cli starting on {} with annotations in {}",
        document_path.display(),
        annotations_path.display()
    );

    // Load before touching the terminal so errors print normally
    let mut app = match App::new(document_path, annotations_path, config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            let outcome = match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => {
                    app.next_block();
                    Ok(())
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    app.previous_block();
                    Ok(())
                }
                KeyCode::Char('a') => app.annotate_selected(),
                KeyCode::Char('r') => app.reload(),
                KeyCode::Char('x') => app.delete_orphaned(),
                _ => Ok(()),
            };
            if let Err(e) = outcome {
                log::warn!("{e:#}");
                app.message = format!("Error: {e:#}");
            }
        }
    }
}

fn status_span(status: &AnnotationStatus) -> Span<'static> {
    match status {
        AnnotationStatus::Attached { method, score, .. } => {
            let color = if *score >= 0.999 {
                Color::Green
            } else {
                Color::Yellow
            };
            Span::styled(
                format!("[{method} {score:.2}]"),
                Style::default().fg(color),
            )
        }
        AnnotationStatus::Orphaned => Span::styled(
            "[ORPHANED]",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .margin(1)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(rows[0]);

    // Block list panel; blocks holding an attached annotation are marked
    let block_items: Vec<ListItem> = app
        .blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            let marked = app.statuses.iter().any(|status| {
                matches!(status, AnnotationStatus::Attached { block: Some(b), .. } if *b == index)
            });
            let marker = if marked { "● " } else { "  " };
            ListItem::new(vec![Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::raw(block.label.clone()),
            ])])
        })
        .collect();

    let title = format!("Blocks: {}", app.document_path.display());
    let blocks_list = List::new(block_items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

    f.render_stateful_widget(blocks_list, chunks[0], &mut app.block_list_state);

    // Annotation panel
    let annotation_items: Vec<ListItem> = if app.annotations.is_empty() {
        vec![ListItem::new("No annotations yet, press a to add one")]
    } else {
        app.annotations
            .iter()
            .zip(&app.statuses)
            .map(|(annotation, status)| {
                ListItem::new(vec![
                    Line::from(vec![
                        status_span(status),
                        Span::raw(format!(" <{}> {}", annotation.anchor.tag_name, app.preview(annotation))),
                    ]),
                    Line::from(Span::styled(
                        format!("    {}", annotation.anchor.selector),
                        Style::default().fg(Color::DarkGray),
                    )),
                ])
            })
            .collect()
    };

    let annotations_list = List::new(annotation_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Annotations: {}", app.annotations_path.display())),
    );
    f.render_widget(annotations_list, chunks[1]);

    // Instructions
    let help_text = vec![
        Line::from(vec![
            Span::raw("q: Quit | "),
            Span::raw("↑/k: Previous | "),
            Span::raw("↓/j: Next | "),
            Span::raw("a: Annotate | r: Reload & reattach | x: Delete orphaned"),
        ]),
        Line::from(app.message.as_str()),
    ];

    let help = Paragraph::new(help_text).block(Block::default());
    f.render_widget(help, rows[1]);
}

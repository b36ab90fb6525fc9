use anyhow::{Context, Result};
use challenge_world_core::{
    EntityKind, Position,
    agent::QTable,
    simulation::{Simulation, SimulationConfig},
    snapshot::{DailyStats, Snapshot},
};
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::HashMap,
    fs::File,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::{Mutex, atomic::AtomicBool},
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file with simulation settings; flags below override it
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,
    /// Grid width
    #[arg(long)]
    width: Option<usize>,
    /// Grid height
    #[arg(long)]
    height: Option<usize>,
    /// Number of obstacles to place
    #[arg(long)]
    obstacles: Option<usize>,
    /// Ticks per simulated day
    #[arg(long)]
    steps_per_day: Option<u32>,
    /// Number of days to simulate
    #[arg(long)]
    days: Option<u32>,
    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
    /// Q-table saved by an earlier run
    #[arg(long, value_name = "FILE")]
    q_table_in: Option<PathBuf>,
    /// Where to save the Q-table on exit
    #[arg(long, value_name = "FILE")]
    q_table_out: Option<PathBuf>,
    /// Run every day without the terminal UI and print the final snapshot
    #[arg(long)]
    headless: bool,
    /// Milliseconds between ticks while autoplaying
    #[arg(long, default_value_t = 200)]
    tick_ms: u64,
    /// Log file used while the terminal UI is active
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

struct App {
    /// The core simulation.
    simulation: Simulation,
    /// Step automatically on every tick of the UI loop.
    autoplay: bool,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(simulation: Simulation) -> Self {
        App {
            simulation,
            autoplay: false,
            should_quit: false,
        }
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) -> Result<()> {
        if !self.simulation.is_running() {
            self.autoplay = false;
            return Ok(());
        }
        self.simulation.step()?;
        Ok(())
    }

    fn toggle_autoplay(&mut self) {
        self.autoplay = !self.autoplay && self.simulation.is_running();
    }

    fn reset(&mut self) -> Result<()> {
        self.autoplay = false;
        self.simulation.reset()?;
        Ok(())
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_tracing(&args)?;

    let config = build_config(&args)?;
    let q_table = args.q_table_in.as_deref().map(load_q_table).transpose()?;
    let simulation = Simulation::new(config, q_table).context("Failed to create simulation")?;

    let simulation = if args.headless {
        run_headless(simulation)?
    } else {
        // Set up the terminal
        let mut terminal = setup_terminal()?;
        let mut app = App::new(simulation);
        let tick_rate = Duration::from_millis(args.tick_ms);

        // Run the main application loop, restoring the terminal even on error
        let result = run_app(&mut terminal, &mut app, tick_rate);
        restore_terminal(&mut terminal)?;
        result?;
        app.simulation
    };

    if let Some(path) = &args.q_table_out {
        save_q_table(path, simulation.q_table())?;
        info!(path = %path.display(), states = simulation.q_table().len(), "Q-table saved");
    }
    Ok(())
}

/// Logs go to stderr in headless mode; with the terminal UI they go to the
/// log file if one was given and are dropped otherwise.
fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(obstacles) = args.obstacles {
        config.num_obstacles = obstacles;
    }
    if let Some(steps) = args.steps_per_day {
        config.steps_per_day = steps;
    }
    if let Some(days) = args.days {
        config.total_days = days;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    Ok(config)
}

fn load_q_table(path: &Path) -> Result<QTable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read Q-table {}", path.display()))?;
    let table: QTable = serde_json::from_str(&text)
        .with_context(|| format!("Invalid Q-table {}", path.display()))?;
    info!(path = %path.display(), states = table.len(), "Q-table loaded");
    Ok(table)
}

fn save_q_table(path: &Path, table: &QTable) -> Result<()> {
    let text = serde_json::to_string_pretty(table)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write Q-table {}", path.display()))
}

/// Runs every day to the end and prints the final snapshot as JSON.
fn run_headless(mut simulation: Simulation) -> Result<Simulation> {
    let stop = AtomicBool::new(false);
    let ticks = simulation.run_until_finished(&stop)?;

    let days = simulation
        .daily_scores()
        .iter()
        .zip(simulation.cumulative_scores());
    for (index, (score, cumulative)) in days.enumerate() {
        info!(day = index + 1, score, cumulative, "daily score");
    }
    let stats = simulation.daily_stats();
    info!(
        ticks,
        seed = simulation.seed(),
        total = stats.total,
        average = stats.average,
        best = ?stats.best,
        epsilon = simulation.agent().epsilon(),
        "run finished"
    );

    println!("{}", serde_json::to_string_pretty(&simulation.snapshot())?);
    Ok(simulation)
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => app.toggle_autoplay(),
                    KeyCode::Char('s') | KeyCode::Right if !app.autoplay => app.tick()?,
                    KeyCode::Char('r') => app.reset()?,
                    _ => {}
                }
            }
        }

        // Autoplay steps are paced by the tick rate
        if last_tick.elapsed() >= tick_rate {
            if app.autoplay {
                app.tick()?;
            }
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let snapshot = app.simulation.snapshot();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(12),   // Map and status
            Constraint::Length(8), // Daily scores
            Constraint::Length(2), // Help
        ])
        .split(frame.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[0]);

    render_map(frame, top[0], &snapshot);
    render_status(frame, top[1], app, &snapshot);
    render_daily_scores(frame, main_layout[1], &snapshot, &app.simulation.daily_stats());

    let help_text = Paragraph::new("'space' autoplay  's'/'→' step  'r' reset  'q'/'Esc' quit")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Renders the grid: agent, game nodes, obstacles and the planned path.
fn render_map(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let mut cells: HashMap<Position, Span> = HashMap::new();
    for pos in &snapshot.path {
        cells.insert(*pos, Span::styled("·", Style::default().fg(Color::Red)));
    }
    // Later kinds draw over earlier ones
    let mut entities: Vec<_> = snapshot.entities.iter().collect();
    entities.sort_by_key(|e| match e.kind {
        EntityKind::Obstacle => 0,
        EntityKind::GameNode => 1,
        EntityKind::Learner => 2,
    });
    for entity in entities {
        let span = match (entity.kind, entity.active) {
            (EntityKind::Learner, _) => Span::styled("@", Style::default().fg(Color::Red).bold()),
            (EntityKind::GameNode, Some(true)) => {
                Span::styled("G", Style::default().fg(Color::Green).bold())
            }
            (EntityKind::GameNode, _) => Span::styled("g", Style::default().fg(Color::Yellow)),
            (EntityKind::Obstacle, _) => Span::styled("#", Style::default().fg(Color::DarkGray)),
        };
        cells.insert(entity.position, span);
    }

    let mut lines: Vec<Line> = Vec::with_capacity(snapshot.height);
    for y in 0..snapshot.height {
        let mut spans: Vec<Span> = Vec::with_capacity(snapshot.width * 2);
        for x in 0..snapshot.width {
            let span = cells
                .get(&Position { x, y })
                .cloned()
                .unwrap_or_else(|| Span::raw("."));
            spans.push(span);
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    let title = format!(
        "Day {}/{} - Step {}/{}",
        snapshot.day.min(snapshot.total_days),
        snapshot.total_days,
        snapshot.steps_today,
        snapshot.steps_per_day
    );
    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App, snapshot: &Snapshot) {
    let agent = app.simulation.agent();
    let last_game = match (&snapshot.last_game_name, &snapshot.last_game_result) {
        (Some(name), Some(result)) => format!("{name} ({result})"),
        _ => "none yet".to_string(),
    };
    let state = if !snapshot.running {
        "finished"
    } else if app.autoplay {
        "autoplay"
    } else {
        "paused"
    };

    let rows = [
        ("Score", snapshot.score.to_string()),
        ("Mode", snapshot.mode.to_string()),
        ("Epsilon", format!("{:.2}", snapshot.epsilon)),
        (
            "Position",
            format!("({}, {})", agent.position().x, agent.position().y),
        ),
        ("Path left", agent.remaining_path().len().to_string()),
        ("Last game", last_game),
        ("Learned states", agent.q_table().len().to_string()),
        ("Seed", app.simulation.seed().to_string()),
        ("Run", state.to_string()),
    ];
    let lines: Vec<Line> = rows
        .into_iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(format!("{label}: "), Style::default().bold()),
                Span::raw(value),
            ])
        })
        .collect();

    let status = Paragraph::new(lines).block(Block::default().title("Agent").borders(Borders::ALL));
    frame.render_widget(status, area);
}

fn render_daily_scores(frame: &mut Frame, area: Rect, snapshot: &Snapshot, stats: &DailyStats) {
    let mut items: Vec<ListItem> = snapshot
        .daily_scores
        .iter()
        .zip(&snapshot.cumulative_scores)
        .enumerate()
        .rev()
        .map(|(index, (score, cumulative))| {
            ListItem::new(format!(
                "Day {:>2}: {:>5}   total {:>6}",
                index + 1,
                score,
                cumulative
            ))
        })
        .collect();
    if items.is_empty() {
        items.push(ListItem::new("Complete a day to see scores."));
    }

    let title = match stats.best {
        Some(best) => format!(
            "Daily scores - total {} avg {:.1} best {}",
            stats.total, stats.average, best
        ),
        None => "Daily scores".to_string(),
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

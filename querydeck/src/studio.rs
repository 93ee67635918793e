//! Interactive studio: one analysis session driven from a prompt
//!
//! Plain lines are questions for the backend. Lines starting with `:` are
//! commands for charts, history and saving. Failures are reported and the
//! loop keeps going; only end of input or `:quit` ends the session.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use querydeck_core::chart;
use querydeck_core::present;
use querydeck_core::{
    ActiveView, ApiClient, ChartId, ChartRequest, ChartType, DashboardId, Error, Session,
};

use crate::output;
use crate::App;

const HELP: &str = "\
Type a question to ask it. Commands:
  :history                         list the chat history
  :rerun N                         run the SQL of turn N again
  :result                          show the current result
  :columns                         columns available for charts
  :chart TYPE CATEGORY VALUES TITLE
                                   add a chart, e.g. :chart bar region revenue,cost Revenue
  :charts                          list charts
  :view ID | :view results         switch the main view
  :delete ID                       delete a chart
  :save [TITLE]                    save as a dashboard
  :load ID                         open a saved dashboard
  :help                            show this help
  :quit                            leave the studio
";

/// A parsed studio input line
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Ask(String),
    History,
    Rerun(usize),
    Result,
    Columns,
    Chart(ChartRequest),
    Charts,
    View(Option<ChartId>),
    Delete(ChartId),
    Save(Option<String>),
    Load(DashboardId),
    Help,
    Quit,
    Blank,
}

impl Input {
    fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Input::Blank);
        }
        let Some(command) = line.strip_prefix(':') else {
            return Ok(Input::Ask(line.to_string()));
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();

        match name {
            "history" | "h" => Ok(Input::History),
            "rerun" => {
                let n: usize = single_arg(&rest, "rerun N")?
                    .parse()
                    .map_err(|_| "turn number must be a positive integer".to_string())?;
                if n == 0 {
                    return Err("turn numbers start at 1".to_string());
                }
                Ok(Input::Rerun(n - 1))
            }
            "result" | "r" => Ok(Input::Result),
            "columns" => Ok(Input::Columns),
            "chart" => {
                if rest.len() < 4 {
                    return Err("usage: :chart TYPE CATEGORY VALUES TITLE".to_string());
                }
                let chart_type: ChartType = rest[0].parse()?;
                Ok(Input::Chart(ChartRequest {
                    title: rest[3..].join(" "),
                    chart_type,
                    category: rest[1].to_string(),
                    values: rest[2]
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect(),
                }))
            }
            "charts" => Ok(Input::Charts),
            "view" => match single_arg(&rest, "view ID|results")? {
                "results" => Ok(Input::View(None)),
                id => Ok(Input::View(Some(parse_chart_id(id)?))),
            },
            "delete" => Ok(Input::Delete(parse_chart_id(single_arg(&rest, "delete ID")?)?)),
            "save" => Ok(Input::Save(if rest.is_empty() {
                None
            } else {
                Some(rest.join(" "))
            })),
            "load" => {
                let id = single_arg(&rest, "load ID")?
                    .parse()
                    .map_err(|_| "dashboard id must be an integer".to_string())?;
                Ok(Input::Load(id))
            }
            "help" | "?" => Ok(Input::Help),
            "quit" | "q" | "exit" => Ok(Input::Quit),
            other => Err(format!("unknown command :{} (try :help)", other)),
        }
    }
}

fn single_arg<'a>(args: &[&'a str], usage: &str) -> std::result::Result<&'a str, String> {
    match args {
        [arg] => Ok(*arg),
        _ => Err(format!("usage: :{}", usage)),
    }
}

fn parse_chart_id(s: &str) -> std::result::Result<ChartId, String> {
    s.parse()
        .map_err(|_| format!("chart id must be an integer (got {})", s))
}

/// Run the studio on stdin/stdout
pub fn run(app: &App, dashboard: Option<DashboardId>, db: Option<i64>) -> Result<()> {
    let (token, client) = app.authenticated()?;

    let mut session = Session::new(db, token.client_id);
    if let Some(id) = dashboard {
        app.block_on(session.load_dashboard(&client, id))
            .context("failed to load dashboard")?;
    }

    let mut studio = Studio {
        app,
        client,
        session,
    };
    studio.label_database();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    studio.repl(stdin.lock(), &mut stdout)
}

struct Studio<'a> {
    app: &'a App,
    client: ApiClient,
    session: Session,
}

impl Studio<'_> {
    fn repl<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        writeln!(out, "querydeck studio (type :help for commands)")?;
        write!(out, "{}", output::format_session(&self.session))?;

        let mut lines = input.lines();
        loop {
            write!(out, "\n> ")?;
            out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            let line = line.context("failed to read input")?;

            let parsed = match Input::parse(&line) {
                Ok(Input::Quit) => break,
                Ok(parsed) => parsed,
                Err(msg) => {
                    writeln!(out, "{}", msg)?;
                    continue;
                }
            };

            if let Err(err) = self.handle(parsed, out) {
                match err.downcast_ref::<Error>() {
                    Some(core) => {
                        writeln!(out, "Error: {}", core.user_message("Request failed"))?;
                        if let Some(hint) = crate::hint_for(core) {
                            writeln!(out, "{}", hint)?;
                        }
                    }
                    None => writeln!(out, "Error: {:#}", err)?,
                }
            }
        }

        if !self.session.chats().is_empty() && !self.session.is_saved() {
            tracing::info!(chats = self.session.chats().len(), "Leaving studio with unsaved session");
        }
        Ok(())
    }

    fn handle<W: Write>(&mut self, input: Input, out: &mut W) -> Result<()> {
        match input {
            Input::Blank | Input::Quit => {}
            Input::Help => write!(out, "{}", HELP)?,
            Input::Ask(question) => {
                let number = self.session.chats().len() + 1;
                let turn = self
                    .app
                    .block_on(self.session.ask(&self.client, &question))?;
                write!(out, "{}", output::format_turn(Some(number), turn))?;
                self.execute(out)?;
            }
            Input::History => {
                if self.session.chats().is_empty() {
                    writeln!(out, "No questions asked yet.")?;
                }
                for (i, turn) in self.session.chats().iter().enumerate() {
                    write!(out, "{}", output::format_turn(Some(i + 1), turn))?;
                }
            }
            Input::Rerun(index) => {
                if self.session.rerun(index)? {
                    self.execute(out)?;
                } else {
                    writeln!(out, "Turn #{} has no SQL to run.", index + 1)?;
                }
            }
            Input::Result => self.show_result(out)?,
            Input::Columns => match self.session.result() {
                Some(result) if chart::has_chartable_rows(result) => {
                    writeln!(out, "{}", chart::available_columns(result).join(", "))?
                }
                _ => writeln!(out, "No table data available for charts.")?,
            },
            Input::Chart(request) => {
                let id = self.session.build_chart(&request)?;
                self.session.select_chart(id)?;
                writeln!(out, "Added chart #{}", id)?;
                self.show_active(out)?;
            }
            Input::Charts => {
                if self.session.charts().is_empty() {
                    writeln!(out, "No charts yet.")?;
                }
                for chart in self.session.charts() {
                    let marker = if self.session.active_view() == ActiveView::Chart(chart.id) {
                        "*"
                    } else {
                        " "
                    };
                    writeln!(
                        out,
                        "{} #{}  {} [{}]",
                        marker,
                        chart.id,
                        chart.title,
                        chart.chart_type.display_name()
                    )?;
                }
            }
            Input::View(Some(id)) => {
                self.session.select_chart(id)?;
                self.show_active(out)?;
            }
            Input::View(None) => {
                self.session.select_results();
                self.show_result(out)?;
            }
            Input::Delete(id) => {
                let removed = self.session.delete_chart(id)?;
                writeln!(out, "Deleted chart #{} ({})", id, removed.title)?;
            }
            Input::Save(title) => {
                let title = title.unwrap_or_else(|| self.session.title().to_string());
                let id = self
                    .app
                    .block_on(self.session.save_dashboard(&self.client, &title))?;
                writeln!(out, "Saved dashboard #{} \"{}\"", id, self.session.title())?;
            }
            Input::Load(id) => {
                self.app
                    .block_on(self.session.load_dashboard(&self.client, id))?;
                self.label_database();
                write!(out, "{}", output::format_session(&self.session))?;
            }
        }
        Ok(())
    }

    /// Execute the active query and show what came back
    fn execute<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let result = self
            .app
            .block_on(self.session.execute_active(&self.client))?
            .cloned();
        if let Some(result) = result {
            writeln!(out)?;
            write!(out, "{}", output::format_result(&result))?;
        }
        Ok(())
    }

    fn show_result<W: Write>(&self, out: &mut W) -> Result<()> {
        match self.session.result() {
            Some(result) => write!(out, "{}", output::format_result(result))?,
            None => writeln!(out, "No result yet.")?,
        }
        Ok(())
    }

    fn show_active<W: Write>(&self, out: &mut W) -> Result<()> {
        match self.session.active_chart() {
            Some(chart) => write!(out, "{}", present::render_chart(chart))?,
            None => self.show_result(out)?,
        }
        Ok(())
    }

    /// Fetch the database's display name when only its id is known
    fn label_database(&mut self) {
        let Some(db_id) = self.session.db_id() else {
            return;
        };
        if self.session.db_name().is_some() {
            return;
        }
        match self.app.block_on(self.client.get_database(db_id)) {
            Ok(info) => self.session.set_db_name(info.db_name),
            Err(e) => tracing::warn!(db_id, error = %e, "Could not look up database name"),
        }
    }
}

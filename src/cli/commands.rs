use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;

use crate::app::{ActionDispatcher, ActionOutcome, App, GalleryAction, GalleryOptions, GalleryState};
use crate::catalog;
use crate::config::{AppConfig, ThemeName};
use crate::filter::{FilterSet, FilterToken};
use crate::messages::MessageId;
use crate::render::{BoardNotice, CardBoard};
use crate::storage::Persistence;

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Filter token: all, favorites, custom or a category name (repeatable)
    #[arg(long = "filter", short = 'f')]
    pub filters: Vec<String>,
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pub pages: usize,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Message text. If omitted, reads from stdin or prompts.
    #[arg()]
    pub text: Option<String>,
    /// Category for the new message; one message is created per category
    #[arg(long = "category", short = 'c', required = true)]
    pub categories: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Custom message identifier
    pub id: MessageId,
    /// Replacement text
    pub text: String,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Custom message identifier
    pub id: MessageId,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FavoriteArgs {
    /// Message identifier
    pub id: MessageId,
}

#[derive(Args, Debug, Clone)]
pub struct ThemeArgs {
    /// Theme to apply (dark or light); toggles when omitted
    #[arg()]
    pub name: Option<ThemeName>,
}

/// Shared inputs for the one-shot commands.
pub struct CommandContext {
    config: Arc<AppConfig>,
    persistence: Persistence,
}

impl CommandContext {
    pub fn new(config: Arc<AppConfig>, persistence: Persistence) -> Self {
        Self {
            config,
            persistence,
        }
    }

    fn open_gallery(&self) -> GalleryState {
        let catalog = catalog::load_catalog(&self.config.catalog_path);
        GalleryState::new(
            catalog,
            self.persistence.clone(),
            GalleryOptions::from(self.config.as_ref()),
            CardBoard::new(),
        )
    }
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn list(context: &CommandContext, args: ListArgs) -> Result<()> {
    let mut gallery = context.open_gallery();
    let output = run_list(&mut gallery, &args)?;
    print!("{output}");
    finish(&gallery)
}

pub fn add(context: &CommandContext, args: AddArgs) -> Result<()> {
    let text = match args.text.clone() {
        Some(text) => text,
        None => match read_stdin()? {
            Some(text) => text,
            None => prompt("Message")?,
        },
    };
    let mut gallery = context.open_gallery();
    let output = run_add(&mut gallery, &text, args.categories)?;
    print!("{output}");
    finish(&gallery)
}

pub fn edit(context: &CommandContext, args: EditArgs) -> Result<()> {
    let mut gallery = context.open_gallery();
    let output = run_edit(&mut gallery, args)?;
    print!("{output}");
    finish(&gallery)
}

pub fn delete(context: &CommandContext, args: DeleteArgs) -> Result<()> {
    let mut gallery = context.open_gallery();
    let yes = args.yes;
    let output = run_delete(&mut gallery, args.id, |preview| {
        if yes {
            return Ok(true);
        }
        let answer = prompt(&format!("Delete \"{preview}\"? [y/N]"))?;
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    })?;
    print!("{output}");
    finish(&gallery)
}

pub fn favorite(context: &CommandContext, args: FavoriteArgs) -> Result<()> {
    let mut gallery = context.open_gallery();
    let output = run_favorite(&mut gallery, args.id)?;
    print!("{output}");
    finish(&gallery)
}

pub fn categories(context: &CommandContext) -> Result<()> {
    let gallery = context.open_gallery();
    if let Some(err) = gallery.catalog_error() {
        eprintln!("error: {err}");
    }
    for category in gallery.store().categories() {
        println!("{category}");
    }
    Ok(())
}

pub fn theme(context: &CommandContext, args: ThemeArgs) -> Result<()> {
    let mut gallery = context.open_gallery();
    let output = run_theme(&mut gallery, args.name)?;
    print!("{output}");
    finish(&gallery)
}

fn run_list(gallery: &mut GalleryState, args: &ListArgs) -> Result<String> {
    let tokens = args
        .filters
        .iter()
        .map(|raw| {
            raw.parse::<FilterToken>()
                .map_err(|reason| anyhow!("invalid filter {raw:?}: {reason}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let now = Instant::now();
    gallery.set_filters(FilterSet::from_tokens(tokens), now);
    gallery.finish_pending();
    for _ in 1..args.pages.max(1) {
        if !gallery.on_proximity(now) {
            break;
        }
        gallery.finish_pending();
    }
    Ok(format_board(
        gallery.renderer(),
        gallery.filters(),
        gallery.filtered().len(),
    ))
}

fn run_add(gallery: &mut GalleryState, text: &str, categories: Vec<String>) -> Result<String> {
    let action = GalleryAction::SubmitMessage {
        text: text.to_string(),
        categories,
    };
    let ids = match dispatch(gallery, action)? {
        ActionOutcome::Added(ids) => ids,
        other => bail!("unexpected outcome {other:?}"),
    };
    let mut out = String::new();
    for id in ids {
        let category = gallery
            .store()
            .get(id)
            .and_then(|message| message.primary_category())
            .unwrap_or_default();
        let _ = writeln!(&mut out, "Added message #{id} [{category}]");
    }
    Ok(out)
}

fn run_edit(gallery: &mut GalleryState, args: EditArgs) -> Result<String> {
    dispatch(
        gallery,
        GalleryAction::EditMessage {
            id: args.id,
            text: args.text,
        },
    )?;
    Ok(format!("Updated message #{}\n", args.id))
}

fn run_delete<F>(gallery: &mut GalleryState, id: MessageId, confirm: F) -> Result<String>
where
    F: FnOnce(&str) -> Result<bool>,
{
    let pending = match dispatch(gallery, GalleryAction::RequestDelete(id))? {
        ActionOutcome::ConfirmationNeeded(pending) => pending,
        other => bail!("unexpected outcome {other:?}"),
    };
    let preview = gallery
        .store()
        .get(id)
        .map(|message| message.text.clone())
        .unwrap_or_default();
    if !confirm(&preview)? {
        return Ok("Aborted.\n".to_string());
    }
    match dispatch(gallery, GalleryAction::ConfirmDelete(pending))? {
        ActionOutcome::Deleted(count) => Ok(format!("Deleted {count} message(s)\n")),
        other => bail!("unexpected outcome {other:?}"),
    }
}

fn run_favorite(gallery: &mut GalleryState, id: MessageId) -> Result<String> {
    match dispatch(gallery, GalleryAction::ToggleFavorite(id))? {
        ActionOutcome::Favorite {
            is_favorite: true, ..
        } => Ok(format!("Message #{id} added to favorites\n")),
        ActionOutcome::Favorite { .. } => Ok(format!("Message #{id} removed from favorites\n")),
        other => bail!("unexpected outcome {other:?}"),
    }
}

fn run_theme(gallery: &mut GalleryState, name: Option<ThemeName>) -> Result<String> {
    let theme = match name {
        Some(theme) => {
            gallery.set_theme(theme);
            theme
        }
        None => match dispatch(gallery, GalleryAction::ToggleTheme)? {
            ActionOutcome::Theme(theme) => theme,
            other => bail!("unexpected outcome {other:?}"),
        },
    };
    Ok(format!("Theme: {theme}\n"))
}

fn dispatch(gallery: &mut GalleryState, action: GalleryAction) -> Result<ActionOutcome> {
    let name = action.name();
    ActionDispatcher::new(gallery)
        .dispatch(action, Instant::now())
        .with_context(|| format!("{name} failed"))
}

/// Surfaces a write that failed after the in-memory change went through.
fn finish(gallery: &GalleryState) -> Result<()> {
    match gallery.take_persistence_failure() {
        Some(err) => Err(anyhow::Error::new(err).context("change applied but not saved")),
        None => Ok(()),
    }
}

fn format_board(board: &CardBoard, filters: &FilterSet, matching: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        &mut out,
        "Filters: {filters} ({} of {matching} shown)",
        board.len()
    );
    match board.notice() {
        Some(BoardNotice::Empty) => out.push_str("No messages match the active filters.\n"),
        Some(BoardNotice::Error(message)) => {
            let _ = writeln!(&mut out, "error: {message}");
        }
        None => {}
    }
    for card in board.cards() {
        let mut headline = format!("#{}  {}", card.id, card.categories.join(", "));
        if card.is_favorite {
            headline.push_str("  [FAVORITE]");
        }
        if card.is_custom {
            headline.push_str("  [CUSTOM]");
        }
        let _ = writeln!(&mut out, "{headline}");
        for line in card.text.lines() {
            let _ = writeln!(&mut out, "    {line}");
        }
    }
    if board.more_available() {
        out.push_str("More messages available; pass --pages to see further.\n");
    }
    out
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

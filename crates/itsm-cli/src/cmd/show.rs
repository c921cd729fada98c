//! `itsm show`: the related-items panel for one incident.

use std::io::{self, Write};

use itsm_core::graph::{RelatedItem, RelatedItems};

use crate::cmd::session::Session;
use crate::cmd::{Context, IncidentArg};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

pub fn run_show(args: &IncidentArg, ctx: &Context) -> anyhow::Result<()> {
    let session = Session::open(ctx)?;
    let items = session
        .graph()
        .related_items(&args.incident)
        .map_err(|e| session.reject(&e))?;

    render_mode(ctx.output, &items, render_text, render_pretty)
}

fn describe(item: &RelatedItem) -> String {
    item.label.as_ref().map_or_else(
        || format!("{}  (missing {})", item.id, item.kind),
        |label| format!("{}  {label}", item.id),
    )
}

fn render_text(items: &RelatedItems, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "relation\tid\ttitle")?;
    let rows = [
        ("parent", items.parent.as_slice()),
        ("child", items.children.as_slice()),
        ("problem", items.problem.as_slice()),
        ("change", items.changes.as_slice()),
        ("affected_asset", items.affected_asset.as_slice()),
        ("asset", items.assets.as_slice()),
        ("kb", items.knowledge_articles.as_slice()),
    ];
    for (relation, entries) in rows {
        for item in entries {
            writeln!(
                w,
                "{relation}\t{}\t{}",
                item.id,
                item.label.as_deref().unwrap_or("-")
            )?;
        }
    }
    Ok(())
}

fn single(w: &mut dyn Write, key: &str, item: Option<&RelatedItem>) -> io::Result<()> {
    pretty_kv(w, key, item.map_or_else(|| "-".to_string(), describe))
}

fn list(w: &mut dyn Write, key: &str, entries: &[RelatedItem]) -> io::Result<()> {
    let Some((first, rest)) = entries.split_first() else {
        return pretty_kv(w, key, "-");
    };
    pretty_kv(w, key, describe(first))?;
    for item in rest {
        writeln!(w, "{:<12} {}", "", describe(item))?;
    }
    Ok(())
}

fn render_pretty(items: &RelatedItems, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{}  {}", items.incident_id, items.title))?;

    single(w, "Parent", items.parent.as_ref())?;
    list(w, "Children", &items.children)?;
    single(w, "Problem", items.problem.as_ref())?;
    list(w, "Changes", &items.changes)?;
    single(w, "Asset", items.affected_asset.as_ref())?;
    list(w, "Also", &items.assets)?;
    list(w, "KB", &items.knowledge_articles)?;

    let dangling = items.dangling().count();
    if dangling > 0 {
        pretty_rule(w)?;
        writeln!(w, "{dangling} reference(s) point at missing records; run `itsm check`")?;
    }
    Ok(())
}

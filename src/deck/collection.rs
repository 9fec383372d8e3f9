use std::path::Path;

use rusqlite::{
    params,
    Connection,
};
use serde_json::json;
use sha2::{
    Digest,
    Sha256,
};

use crate::core::{
    AnkitabError,
    Note,
    NoteType,
};

// Anki collection schema, version 11. The `col` row carries the
// conf/models/decks/dconf configuration as JSON blobs.
const SCHEMA: &str = "
CREATE TABLE col (
    id     integer primary key,
    crt    integer not null,
    mod    integer not null,
    scm    integer not null,
    ver    integer not null,
    dty    integer not null,
    usn    integer not null,
    ls     integer not null,
    conf   text not null,
    models text not null,
    decks  text not null,
    dconf  text not null,
    tags   text not null
);
CREATE TABLE notes (
    id    integer primary key,
    guid  text not null,
    mid   integer not null,
    mod   integer not null,
    usn   integer not null,
    tags  text not null,
    flds  text not null,
    sfld  integer not null,
    csum  integer not null,
    flags integer not null,
    data  text not null
);
CREATE TABLE cards (
    id     integer primary key,
    nid    integer not null,
    did    integer not null,
    ord    integer not null,
    mod    integer not null,
    usn    integer not null,
    type   integer not null,
    queue  integer not null,
    due    integer not null,
    ivl    integer not null,
    factor integer not null,
    reps   integer not null,
    lapses integer not null,
    left   integer not null,
    odue   integer not null,
    odid   integer not null,
    flags  integer not null,
    data   text not null
);
CREATE TABLE revlog (
    id      integer primary key,
    cid     integer not null,
    usn     integer not null,
    ease    integer not null,
    ivl     integer not null,
    lastIvl integer not null,
    factor  integer not null,
    time    integer not null,
    type    integer not null
);
CREATE TABLE graves (
    usn  integer not null,
    oid  integer not null,
    type integer not null
);
CREATE INDEX ix_notes_usn ON notes (usn);
CREATE INDEX ix_cards_usn ON cards (usn);
CREATE INDEX ix_revlog_usn ON revlog (usn);
CREATE INDEX ix_cards_nid ON cards (nid);
CREATE INDEX ix_cards_sched ON cards (did, queue, due);
CREATE INDEX ix_revlog_cid ON revlog (cid);
CREATE INDEX ix_notes_csum ON notes (csum);
";

const CARD_CSS: &str = ".card {\n font-family: arial;\n font-size: 20px;\n text-align: center;\n color: black;\n background-color: white;\n}\n";

const LATEX_PRE: &str = "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n";

/// First 8 hex digits of the sort-field hash, as Anki stores in
/// `notes.csum` for duplicate lookup.
pub fn field_checksum(text: &str) -> u32 {
    let digest = Sha256::digest(text.as_bytes());
    u32::from_be_bytes(digest[..4].try_into().unwrap())
}

fn field_json(name: &str, ord: usize) -> serde_json::Value {
    json!({
        "name": name,
        "ord": ord,
        "font": "Arial",
        "media": [],
        "rtl": false,
        "size": 20,
        "sticky": false,
    })
}

fn template_json(name: &str, ord: usize, qfmt: &str, afmt: &str) -> serde_json::Value {
    json!({
        "name": name,
        "ord": ord,
        "qfmt": qfmt,
        "afmt": afmt,
        "bqfmt": "",
        "bafmt": "",
        "did": null,
    })
}

fn model_json(model_id: i64, note_type: NoteType, mod_secs: i64) -> serde_json::Value {
    let forward = template_json(
        "Forward",
        0,
        "{{Front}}\n<br>\n{{FrontAudio}}",
        "{{FrontSide}}\n<hr id=\"answer\">\n{{Back}}\n<br>\n{{BackAudio}}",
    );

    let (templates, req) = match note_type {
        NoteType::ForwardOnly => (json!([forward]), json!([[0, "all", [0]]])),
        NoteType::ForwardAndBackward => {
            let backward = template_json(
                "Backward",
                1,
                "{{Back}}\n<br>\n{{BackAudio}}",
                "{{FrontSide}}\n<hr id=\"answer\">\n{{Front}}\n<br>\n{{FrontAudio}}",
            );
            (json!([forward, backward]), json!([[0, "all", [0]], [1, "all", [1]]]))
        }
    };

    json!({
        "id": model_id,
        "name": note_type.model_name(),
        "type": 0,
        "mod": mod_secs,
        "usn": -1,
        "sortf": 0,
        "did": 1,
        "tmpls": templates,
        "flds": [
            field_json("Front", 0),
            field_json("Back", 1),
            field_json("FrontAudio", 2),
            field_json("BackAudio", 3),
        ],
        "css": CARD_CSS,
        "latexPre": LATEX_PRE,
        "latexPost": "\\end{document}",
        "latexsvg": false,
        "req": req,
        "tags": [],
        "vers": [],
    })
}

fn deck_json(deck_id: i64, name: &str, mod_secs: i64) -> serde_json::Value {
    json!({
        "id": deck_id,
        "name": name,
        "desc": "",
        "mod": mod_secs,
        "usn": -1,
        "collapsed": false,
        "browserCollapsed": false,
        "dyn": 0,
        "conf": 1,
        "extendNew": 0,
        "extendRev": 50,
        "newToday": [0, 0],
        "revToday": [0, 0],
        "lrnToday": [0, 0],
        "timeToday": [0, 0],
    })
}

fn conf_json(model_id: i64) -> serde_json::Value {
    json!({
        "activeDecks": [1],
        "addToCur": true,
        "collapseTime": 1200,
        "curDeck": 1,
        "curModel": model_id.to_string(),
        "dueCounts": true,
        "estTimes": true,
        "newBury": true,
        "newSpread": 0,
        "nextPos": 1,
        "sortBackwards": false,
        "sortType": "noteFld",
        "timeLim": 0,
    })
}

fn dconf_json() -> serde_json::Value {
    json!({
        "id": 1,
        "name": "Default",
        "autoplay": true,
        "timer": 0,
        "replayq": true,
        "mod": 0,
        "usn": 0,
        "maxTaken": 60,
        "new": {
            "bury": true,
            "delays": [1, 10],
            "initialFactor": 2500,
            "ints": [1, 4, 7],
            "order": 1,
            "perDay": 20,
            "separate": true,
        },
        "rev": {
            "bury": true,
            "ease4": 1.3,
            "fuzz": 0.05,
            "ivlFct": 1,
            "maxIvl": 36500,
            "minSpace": 1,
            "perDay": 100,
        },
        "lapse": {
            "delays": [10],
            "leechAction": 0,
            "leechFails": 8,
            "minInt": 1,
            "mult": 0,
        },
    })
}

fn sound_tag(media_filename: &Option<String>) -> String {
    match media_filename {
        Some(name) => format!("[sound:{}]", name),
        None => String::new(),
    }
}

/// Writes a fresh `collection.anki2` at `path`. Card `due` follows note
/// order so new-card study order matches the input table.
pub fn write_collection(
    path: &Path,
    deck_name: &str,
    deck_id: i64,
    model_id: i64,
    note_type: NoteType,
    notes: &[Note],
) -> Result<(), AnkitabError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;

    let now = chrono::Utc::now();
    // Collection creation time is pinned to 04:00 of the current day,
    // matching Anki's day-rollover convention.
    let crt = (now.timestamp() / 86_400) * 86_400 + 4 * 3600;
    let mod_ms = now.timestamp_millis();
    let mod_secs = now.timestamp();

    let models = json!({ (model_id.to_string()): model_json(model_id, note_type, mod_secs) });
    let decks = json!({
        "1": deck_json(1, "Default", mod_secs),
        (deck_id.to_string()): deck_json(deck_id, deck_name, mod_secs),
    });

    conn.execute(
        "INSERT INTO col VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            1,
            crt,
            mod_ms,
            mod_ms,
            11,
            0,
            0,
            0,
            conf_json(model_id).to_string(),
            models.to_string(),
            decks.to_string(),
            json!({ "1": dconf_json() }).to_string(),
            "{}",
        ],
    )?;

    let mut note_stmt = conn.prepare(
        "INSERT INTO notes VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    let mut card_stmt = conn.prepare(
        "INSERT INTO cards VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
    )?;

    for (idx, note) in notes.iter().enumerate() {
        let fields = [
            note.front.clone(),
            note.back.clone(),
            sound_tag(&note.front_audio),
            sound_tag(&note.back_audio),
        ]
        .join("\u{1f}");

        note_stmt.execute(params![
            note.id,
            note.guid,
            model_id,
            mod_secs,
            -1,
            "",
            fields,
            note.front,
            field_checksum(&note.front),
            0,
            "",
        ])?;

        for ord in 0..note.note_type.card_count() {
            card_stmt.execute(params![
                note.id * 10 + ord as i64,
                note.id,
                deck_id,
                ord as i64,
                mod_secs,
                -1,
                0,
                0,
                (idx + 1) as i64,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                "",
            ])?;
        }
    }

    Ok(())
}

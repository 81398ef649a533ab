//! Server-rendered HTML. Every interpolated value goes through `escape`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::db::{Observation, User};
use crate::encyclopedia::{Summary, SummaryOrigin};

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Everything but RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a path segment for links.
fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

fn layout(title: &str, user: Option<&User>, flashes: &[String], body: &str) -> String {
    let nav = match user {
        Some(user) => format!(
            r#"<a href="/">Home</a> <a href="/upload">Upload</a> <a href="/my_observations">My observations</a> <a href="/feed">Map</a> <a href="/search">Search</a> <a href="/profile">{}</a> <a href="/logout">Log out</a>"#,
            escape(&user.username)
        ),
        None => r#"<a href="/login">Log in</a> <a href="/register">Register</a>"#.to_string(),
    };
    let flashes: String = flashes
        .iter()
        .map(|m| format!(r#"<li class="flash">{}</li>"#, escape(m)))
        .collect();
    let flashes = if flashes.is_empty() {
        String::new()
    } else {
        format!(r#"<ul class="flashes">{flashes}</ul>"#)
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · naturelog</title>
</head>
<body>
<nav>{nav}</nav>
{flashes}
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    )
}

fn observation_cards(observations: &[Observation], deletable: bool) -> String {
    if observations.is_empty() {
        return "<p>No observations yet.</p>".to_string();
    }
    let cards: String = observations
        .iter()
        .map(|obs| {
            let delete = if deletable {
                format!(
                    r#"<form method="post" action="/observations/{}/delete"><button type="submit">Delete</button></form>"#,
                    obs.id
                )
            } else {
                String::new()
            };
            format!(
                r#"<li class="observation">
<img src="/image/{image}" alt="{species}" width="240">
<p><a href="/encyclopedia/{species_link}">{species}</a> by {uploader}</p>
<p>{lat:.5}, {lon:.5} · {created}</p>
{delete}
</li>"#,
                image = encode_segment(&obs.image_id),
                species = escape(&obs.species),
                species_link = encode_segment(&obs.species),
                uploader = escape(&obs.uploader_username),
                lat = obs.latitude,
                lon = obs.longitude,
                created = escape(&obs.created_at),
            )
        })
        .collect();
    format!(r#"<ul class="observations">{cards}</ul>"#)
}

pub fn home(user: &User, flashes: &[String], recent: &[Observation], total: usize) -> String {
    let body = format!(
        "<p>Welcome back, {}. {total} observations logged so far.</p><h2>Latest sightings</h2>{}",
        escape(&user.username),
        observation_cards(recent, false)
    );
    layout("Home", Some(user), flashes, &body)
}

pub fn register(flashes: &[String]) -> String {
    let body = r#"<form method="post" action="/register">
<label>Username <input name="username" required></label>
<label>Email <input name="email" type="email"></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Create account</button>
</form>
<p>Already registered? <a href="/login">Log in</a></p>"#;
    layout("Register", None, flashes, body)
}

pub fn login(flashes: &[String]) -> String {
    let body = r#"<form method="post" action="/login">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Log in</button>
</form>
<p>New here? <a href="/register">Register</a></p>"#;
    layout("Log in", None, flashes, body)
}

pub fn profile(user: &User, flashes: &[String]) -> String {
    let body = format!(
        r#"<p>Member since {created}</p>
<form method="post" action="/profile">
<label>Username <input name="username" value="{username}"></label>
<label>Email <input name="email" type="email" value="{email}"></label>
<label>New password <input name="password" type="password" placeholder="leave blank to keep"></label>
<button type="submit">Save</button>
</form>"#,
        created = escape(&user.created_at),
        username = escape(&user.username),
        email = escape(&user.email),
    );
    layout("Profile", Some(user), flashes, &body)
}

pub fn upload(user: &User, flashes: &[String], max_upload_bytes: usize) -> String {
    let body = format!(
        r#"<form method="post" action="/upload" enctype="multipart/form-data">
<label>Photo <input name="image" type="file" accept="image/jpeg,image/png,image/gif,image/webp" required></label>
<label>Species <input name="species" required></label>
<label>Latitude <input name="latitude" type="number" step="any" min="-90" max="90" required></label>
<label>Longitude <input name="longitude" type="number" step="any" min="-180" max="180" required></label>
<button type="submit">Upload</button>
</form>
<p>JPEG, PNG, GIF or WebP up to {} KiB.</p>"#,
        max_upload_bytes / 1024
    );
    layout("New observation", Some(user), flashes, &body)
}

pub fn my_observations(user: &User, flashes: &[String], observations: &[Observation]) -> String {
    layout(
        "My observations",
        Some(user),
        flashes,
        &observation_cards(observations, true),
    )
}

pub fn search(user: &User, flashes: &[String], query: &str, results: &[Observation]) -> String {
    let results = if query.trim().is_empty() {
        String::new()
    } else {
        format!(
            "<p>{} result(s) for \"{}\"</p>{}",
            results.len(),
            escape(query),
            observation_cards(results, false)
        )
    };
    let body = format!(
        r#"<form method="get" action="/search">
<input name="q" value="{}" placeholder="species or username">
<button type="submit">Search</button>
</form>
{results}"#,
        escape(query)
    );
    layout("Search", Some(user), flashes, &body)
}

pub fn feed(user: &User, flashes: &[String]) -> String {
    let body = r#"<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<form id="filters">
<input name="species" placeholder="species">
<input name="username" placeholder="username">
<button type="submit">Filter</button>
</form>
<div id="map" style="height: 70vh"></div>
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script>
const map = L.map('map').setView([20, 0], 2);
L.tileLayer('https://tile.openstreetmap.org/{z}/{x}/{y}.png', {
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
const layer = L.layerGroup().addTo(map);
const text = (s) => { const d = document.createElement('div'); d.textContent = s; return d.innerHTML; };
async function load(params) {
  const res = await fetch('/api/observations?' + new URLSearchParams(params));
  const data = await res.json();
  layer.clearLayers();
  L.geoJSON(data, {
    onEachFeature: (f, l) => l.bindPopup(
      `<img src="${f.properties.image_url}" width="160"><br>${text(f.properties.species)} by ${text(f.properties.uploader)}`)
  }).addTo(layer);
}
document.getElementById('filters').addEventListener('submit', (e) => {
  e.preventDefault();
  load(new FormData(e.target));
});
load({});
</script>"#;
    layout("Map", Some(user), flashes, body)
}

pub fn encyclopedia(summary: &Summary) -> String {
    let note = match (summary.origin, summary.cached_at) {
        (SummaryOrigin::Placeholder, _) | (_, None) => String::new(),
        (_, Some(at)) => format!(
            r#"<p class="source">From Wikipedia, retrieved {}</p>"#,
            at.format("%Y-%m-%d")
        ),
    };
    let body = format!("<p>{}</p>{note}", escape(&summary.text));
    layout(&summary.species, None, &[], &body)
}

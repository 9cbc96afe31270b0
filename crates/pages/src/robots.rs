/// Paths listed as disallowed to draw in crawlers that ignore robots.txt.
pub const BAIT_PATHS: [&str; 14] = [
    "/admin/",
    "/admin/dashboard/",
    "/private/",
    "/internal-documents/",
    "/confidential/",
    "/api/v1/users/",
    "/api/v2/accounts/",
    "/backup/",
    "/database-exports/",
    "/financial-reports/",
    "/employee-records/",
    "/staging/",
    "/debug/",
    "/config/",
];

pub fn robots_txt(base_url: &str) -> String {
    let mut out = String::from("User-agent: *\n");
    for path in BAIT_PATHS {
        out.push_str("Disallow: ");
        out.push_str(path);
        out.push('\n');
    }
    out.push_str("Allow: /\n\n");
    out.push_str(&format!("Sitemap: {}/sitemap.xml\n", base_url.trim_end_matches('/')));
    out
}

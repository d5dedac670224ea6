//! Common test utilities for integration tests

use chrono::{DateTime, FixedOffset, TimeZone};
use std::fs;
use std::path::Path;
use tender_comb::config::ResolvedConfig;
use tender_comb::dates::singapore;

/// Writes `content` to `path`, creating parent directories.
#[allow(dead_code)]
pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// 2026-01-15 10:00 in Singapore, a Thursday.
#[allow(dead_code)]
pub fn now() -> DateTime<FixedOffset> {
    singapore().with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Pipeline configuration rooted in `dir`, without retry delays.
#[allow(dead_code)]
pub fn test_config(dir: &Path) -> ResolvedConfig {
    ResolvedConfig {
        feeds_catalog: dir.join("feeds.toml"),
        selections_dir: dir.join("selections"),
        output_dir: dir.join("exports"),
        request_timeout_secs: 5,
        max_retries: 0,
        retry_initial_delay_ms: 1,
        retry_max_delay_ms: 1,
        concurrent_fetches: 2,
        ..Default::default()
    }
}

/// Catalog with one BO and one AWD feed served from `base`.
#[allow(dead_code)]
pub fn catalog_toml(base: &str) -> String {
    format!(
        r#"
[feeds."1. Construction"."a. Building Works"]
bo = "{base}/rss/Building_Works-CREATE_BO_FEED.xml"
awd = "{base}/rss/Building_Works-CREATE_AWD_FEED.xml"
"#
    )
}

/// Business-opportunity feed with one current and one stale item.
#[allow(dead_code)]
pub const SAMPLE_BO_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>GeBIZ Business Opportunities</title>
    <item>
      <title>Repainting of HDB blocks ITQ: HDB000ETQ26000001</title>
      <link>https://www.gebiz.gov.sg/ptn/opportunity/directlink.xhtml?docCode=HDB000ETQ26000001</link>
      <description>Agency: Housing &amp; Development Board | Closing on 30/01/2026 16:00:00</description>
      <pubDate>Mon, 12 Jan 2026 09:00:00 +0800</pubDate>
    </item>
    <item>
      <title>Supply of office paper ITQ: MOE000ETQ25000900</title>
      <link>https://www.gebiz.gov.sg/ptn/opportunity/directlink.xhtml?docCode=MOE000ETQ25000900</link>
      <description>Agency: Ministry of Education | Closing on 15/12/2025 16:00:00</description>
      <pubDate>Mon, 01 Dec 2025 09:00:00 +0800</pubDate>
    </item>
  </channel>
</rss>"#;

/// Award feed with one item.
#[allow(dead_code)]
pub const SAMPLE_AWD_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>GeBIZ Awards</title>
    <item>
      <title>Cleaning services for Block 12 ITQ: HDB000ETQ25000777</title>
      <link>https://www.gebiz.gov.sg/ptn/opportunity/directlink.xhtml?docCode=HDB000ETQ25000777</link>
      <description>Awarded To: Sparkle Pte Ltd&lt;br/&gt;Award Value: $10,000</description>
      <pubDate>Tue, 13 Jan 2026 09:00:00 +0800</pubDate>
    </item>
  </channel>
</rss>"#;

/// Sesami opportunities table with one row.
#[allow(dead_code)]
pub const SAMPLE_SESAMI_PAGE: &str = r#"
<html><body>
  <table id="rfqTender">
    <tbody>
      <tr>
        <td>Changi Airport Group</td><td>RFQ-2026-001</td><td>RFQ</td>
        <td>Provision of Pest Control</td><td>12 Jan 2026 10:00</td>
        <td>26 Jan 2026 17:00</td><td>Online</td>
        <td><a href="javascript:viewDetail('D12345', 'H9')">View</a></td>
      </tr>
    </tbody>
  </table>
</body></html>"#;

// Portal URLs
pub const GEBIZ_LISTING_URL: &str =
    "https://www.gebiz.gov.sg/ptn/opportunity/BOListing.xhtml?origin=opportunities";
pub const GEBIZ_BASE_URL: &str = "https://www.gebiz.gov.sg";
pub const SESAMI_URL: &str = "https://sesami.online/bizopps/businessOpportunities.jsp";
pub const SESAMI_DETAIL_URL: &str = "https://sesami.online/bizopps/businessOpportunityView.jsp";
pub const TENDERBOARD_URL: &str = "https://www.tenderboard.biz/singaporetenders";
pub const JPMC_URL: &str = "https://jpmcbrunei.com/tender-quotation/";
pub const STLOGS_PORTAL_URL: &str = "https://epro.stlogs.com/eProVportal/spLogin.do";
pub const ARIBA_DISCOVERY_URL: &str =
    "https://portal.us.bn.cloud.ariba.com/dashboard/public/appext/comsapsbncdiscoveryui#/leads/search?anId=ANONYMOUS";

/// Listing pages followed per paginated portal unless configured otherwise.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Pseudo feed URL attached to items scraped from the GeBIZ listing page.
pub const LISTING_FEED_URL: &str = "HTML_LISTING";

// Browser-like request headers; some portals reject unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Singapore has used UTC+08:00 without daylight saving since 1982.
pub const SINGAPORE_OFFSET_SECS: i32 = 8 * 3600;

// Workbook layout
pub const OPPORTUNITIES_SHEET: &str = "Opportunities";
pub const AWARDS_SHEET: &str = "GeBIZ Awards";
pub const SETTINGS_SHEET: &str = "Settings";
pub const EXPORT_SUFFIX: &str = "Tender Export";

pub const OPPORTUNITY_COLUMNS: &[&str] = &[
    "No.",
    "Published Date",
    "Closing Date",
    "Closing Time",
    "Date Detected",
    "ITQ/ITT",
    "Calling Entity",
    "Description",
    "Link",
    "Main Header",
    "Sub Header",
    "Sourcing Doc No.",
];

pub const AWARD_COLUMNS: &[&str] = &[
    "No.",
    "Awarded Date",
    "Published Date",
    "Award Value",
    "Awarded To",
    "Closing Date",
    "Closing Time",
    "Date Detected",
    "ITQ/ITT",
    "Calling Entity",
    "Description",
    "Link",
    "Main Header",
    "Sub Header",
    "Sourcing Doc No.",
];

// Portal aliases accepted on the command line and in run files
pub const SESAMI_ALIASES: &[&str] = &["sesami"];
pub const TENDERBOARD_ALIASES: &[&str] = &["tenderboard", "tb"];
pub const JPMC_ALIASES: &[&str] = &["jpmc", "jpmc-brunei"];
pub const STLOGS_ALIASES: &[&str] = &["stlogs", "st-logistics"];
pub const ARIBA_ALIASES: &[&str] = &["ariba", "sap-ariba"];
pub const GEBIZ_LISTING_ALIASES: &[&str] = &["gebiz-listing", "listing", "html"];

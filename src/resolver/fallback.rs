//! Directory-independent fallback selectors, tier 3 of form resolution.
//!
//! Generic id/name/class conventions seen across business directories,
//! ordered most-specific first. The first pattern matching exactly one
//! visible, enabled element wins.

use phf::phf_map;

use crate::models::LogicalField;

static FALLBACK_SELECTORS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "business_name" => &[
        "input[name='business_name']",
        "input[name='company_name']",
        "input[name='name']",
        "input#businessName",
        "input#companyName",
        "#business-name",
        ".business-name input",
    ],
    "address" => &[
        "input[name='address']",
        "input[name='street']",
        "input[name='address1']",
        "input#address",
        "textarea[name='address']",
        "#address",
        ".address input",
    ],
    "city" => &[
        "input[name='city']",
        "input#city",
        "#city",
        ".city input",
    ],
    "state" => &[
        "select[name='state']",
        "select[name='province']",
        "select[name='region']",
        "input[name='state']",
        "select#state",
        "#state",
        ".state select",
    ],
    "zip" => &[
        "input[name='zip']",
        "input[name='zipcode']",
        "input[name='postal_code']",
        "input[name='postcode']",
        "input#zip",
        "#zip",
        ".zip input",
    ],
    "phone" => &[
        "input[name='phone']",
        "input[name='telephone']",
        "input[name='tel']",
        "input[type='tel']",
        "input#phone",
        "#phone",
        ".phone input",
    ],
    "website" => &[
        "input[name='website']",
        "input[name='url']",
        "input[name='web']",
        "input[type='url']",
        "input#website",
        "#website",
        ".website input",
    ],
    "email" => &[
        "input[name='email']",
        "input[type='email']",
        "input#email",
        "#email",
        ".email input",
    ],
    "description" => &[
        "textarea[name='description']",
        "textarea[name='about']",
        "textarea[name='bio']",
        "textarea[name='summary']",
        "textarea#description",
        "#description",
        ".description textarea",
    ],
    "category" => &[
        "select[name='category']",
        "select[name='business_category']",
        "select[name='industry']",
        "select[name='type']",
        "select#category",
        "#category",
        ".category select",
    ],
};

/// Fallback patterns for a logical field, in trial order.
pub fn fallback_selectors(field: LogicalField) -> &'static [&'static str] {
    FALLBACK_SELECTORS.get(field.as_str()).copied().unwrap_or(&[])
}

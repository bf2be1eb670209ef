use core::time::Duration;
use std::{borrow::Cow, ffi::OsStr, sync::Arc};

use headless_chrome::{Browser, LaunchOptions, Tab};
use tokio::task::spawn_blocking;

const ELEMENT_TIMEOUT: Duration = Duration::from_secs(20);

pub fn puppeteer(headless: bool) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![OsStr::new("--disable-blink-features=AutomationControlled")],
        headless,
        ..LaunchOptions::default()
    })
}

/// Fresh tab with every other tab (including the launch tab) closed.
pub fn first_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    let tab = browser.new_tab()?;

    {
        let tabs_guard = browser
            .get_tabs()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for remain in &*tabs_guard {
            if !Arc::ptr_eq(&tab, remain) {
                remain.close(true)?;
            }
        }
    }

    Ok(tab)
}

pub async fn navigate_to(tab: &Arc<Tab>, url: Cow<'static, str>) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);
    spawn_blocking(move || tab.navigate_to(&url)?.wait_until_navigated().map(|_| ())).await?
}

pub async fn wait_for(tab: &Arc<Tab>, selector: Cow<'static, str>) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);
    spawn_blocking(move || {
        tab.wait_for_element_with_custom_timeout(&selector, ELEMENT_TIMEOUT)
            .map(|_| ())
    })
    .await?
}

/// Outer HTML of the first element matching `selector`.
pub async fn outer_html(tab: &Arc<Tab>, selector: Cow<'static, str>) -> anyhow::Result<String> {
    let tab = Arc::clone(tab);
    spawn_blocking(move || tab.find_element(&selector)?.get_content()).await?
}

//! App name to package name mapping for `Launch` actions.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Display names the model may use, mapped to Android package names.
static APP_PACKAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Messaging & social
        ("微信", "com.tencent.mm"),
        ("QQ", "com.tencent.mobileqq"),
        ("微博", "com.sina.weibo"),
        ("小红书", "com.xingin.xhs"),
        ("知乎", "com.zhihu.android"),
        ("抖音", "com.ss.android.ugc.aweme"),
        ("哔哩哔哩", "tv.danmaku.bili"),
        ("Telegram", "org.telegram.messenger"),
        ("WhatsApp", "com.whatsapp"),
        // Shopping & services
        ("淘宝", "com.taobao.taobao"),
        ("京东", "com.jingdong.app.mall"),
        ("拼多多", "com.xunmeng.pinduoduo"),
        ("美团", "com.sankuai.meituan"),
        ("饿了么", "me.ele"),
        ("支付宝", "com.eg.android.AlipayGphone"),
        // Maps & travel
        ("高德地图", "com.autonavi.minimap"),
        ("百度地图", "com.baidu.BaiduMap"),
        ("携程", "ctrip.android.view"),
        ("12306", "com.MobileTicket"),
        ("Google Maps", "com.google.android.apps.maps"),
        // System & Google
        ("Chrome", "com.android.chrome"),
        ("Settings", "com.android.settings"),
        ("设置", "com.android.settings"),
        ("Camera", "com.android.camera"),
        ("相机", "com.android.camera"),
        ("Gmail", "com.google.android.gm"),
        ("YouTube", "com.google.android.youtube"),
        ("Play Store", "com.android.vending"),
    ])
});

/// Look up the package for an app display name.
pub fn get_package(app_name: &str) -> Option<&'static str> {
    APP_PACKAGES.get(app_name.trim()).copied()
}

/// Find the app whose package appears in a `dumpsys window` focus line.
///
/// Several names share a package; the lexically smallest one is returned so
/// the answer does not depend on hash order.
pub fn app_for_window_line(line: &str) -> Option<&'static str> {
    APP_PACKAGES
        .iter()
        .filter(|(_, package)| line.contains(&format!("{}/", package)))
        .map(|(name, _)| *name)
        .min()
}

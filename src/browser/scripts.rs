//! JavaScript evaluated in the viewer tab.
//!
//! Page helpers are written against a `(document, window)` pair and wrapped
//! with [`in_every_document`] so they also reach same-origin frames, where
//! the photo viewer usually lives.

/// Serialize the main document and every reachable frame.
pub const SNAPSHOT: &str = r#"
(() => {
    const MAX_DEPTH = 5;
    const seen = new Set();

    const serialize = (doc, key, depth) => {
        const entry = {
            key, href: '', accessible: true, hasBody: false, hasDocumentElement: false,
            html: null, text: null, frames: []
        };
        try {
            entry.href = String((doc.location && doc.location.href) || '');
            entry.hasBody = !!doc.body;
            entry.hasDocumentElement = !!doc.documentElement;
            if (doc.documentElement) {
                const clone = doc.documentElement.cloneNode(true);
                const live = doc.documentElement.querySelectorAll('input, textarea');
                const copies = clone.querySelectorAll('input, textarea');
                live.forEach((el, i) => {
                    if (copies[i] && el.value != null) copies[i].setAttribute('value', String(el.value));
                });
                clone.querySelectorAll('script, style, noscript, template').forEach(el => el.remove());
                entry.html = clone.outerHTML;
            }
            if (doc.body) entry.text = doc.body.innerText || '';
        } catch (e) {
            entry.accessible = false;
            entry.html = null;
            entry.text = null;
            return entry;
        }

        if (depth >= MAX_DEPTH) return entry;
        doc.querySelectorAll('iframe, frame').forEach((frame, i) => {
            const childKey = key + '/' + i;
            let child = null;
            try { child = frame.contentDocument; } catch (e) { child = null; }
            if (!child) {
                entry.frames.push({ key: childKey, accessible: false, frames: [] });
                return;
            }
            if (seen.has(child)) return;
            seen.add(child);
            entry.frames.push(serialize(child, childKey, depth + 1));
        });
        return entry;
    };

    seen.add(document);
    return serialize(document, '0', 0);
})()
"#;

/// Label scan over text nodes: the value follows the caption in the same
/// node, or sits in the caption's next sibling element.
pub const LABEL_IDS: &str = r#"
(() => {
    const findByLabel = (label) => {
        const root = document.body || document.documentElement;
        if (!root) return '';
        const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT);
        let node;
        while ((node = walker.nextNode())) {
            const text = node.textContent || '';
            const index = text.indexOf(label);
            if (index === -1) continue;
            const after = text.slice(index + label.length).trim();
            if (after) return after.split(/\s+/)[0];
            const parent = node.parentElement;
            const sibling = parent && parent.nextElementSibling;
            const value = sibling ? (sibling.textContent || '').trim() : '';
            if (value) return value.split(/\s+/)[0];
        }
        return '';
    };

    const parcelId = findByLabel('地块编号：');
    let projectId = findByLabel('项目编号：') || findByLabel('项目名称：');
    if (!projectId && parcelId) {
        const match = parcelId.match(/([A-Z0-9]{2,})[-_]/);
        if (match) projectId = match[1];
    }
    return { projectId, parcelId };
})()
"#;

pub const ENSURE_ALL_AZIMUTHS: &str = r#"
    const label = Array.from(document.querySelectorAll('.el-checkbox__label'))
        .find(el => (el.textContent || '').includes('全部方位角'));
    if (!label) return false;
    const box = label.closest('.el-checkbox');
    if (!box || box.classList.contains('is-checked')) return false;
    box.click();
    return true;
"#;

const VISIBILITY: &str = r#"
    const isVisible = (el) => {
        if (!el) return false;
        try {
            const style = window.getComputedStyle(el);
            if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return false;
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        } catch (e) { return false; }
    };
    const isClickable = (el) => {
        if (!el || !isVisible(el)) return false;
        if (el.disabled) return false;
        return !(el.classList.contains('is-disabled') || el.classList.contains('disabled'));
    };
"#;

pub const CLICK_NEXT_IMAGE: &str = r#"
    for (const selector of ['.el-carousel__arrow--right', '.el-carousel__arrow.el-carousel__arrow--right']) {
        for (const btn of document.querySelectorAll(selector)) {
            if (isClickable(btn)) { btn.click(); return `clicked ${selector}`; }
        }
    }

    const textPatterns = ['下一张', '下一张>', '下一张 >'];
    const exclude = ['下一条', '下一项', '下一页', '祝捷', '用户', '普通用户'];
    for (const selector of ['button', '[role="button"]', '.btn-next', '[class*="next-btn"]']) {
        for (const btn of document.querySelectorAll(selector)) {
            if (!isClickable(btn)) continue;
            const text = (btn.innerText || btn.textContent || '').trim();
            if (exclude.some(ex => text.includes(ex))) continue;
            if (textPatterns.some(p => text === p || (text.includes(p) && !text.includes('条')))) {
                btn.click();
                return `clicked text "${text}"`;
            }
        }
    }

    for (const selector of ['.el-icon-caret-right', '.el-icon-arrow-right', 'i.el-icon-caret-right']) {
        for (const icon of document.querySelectorAll(selector)) {
            if (!isVisible(icon)) continue;
            const button = icon.closest('button') || icon.closest('[role="button"]') || icon.parentElement;
            if (!isClickable(button)) continue;
            const text = (button.innerText || button.textContent || '').trim();
            if (exclude.some(ex => text.includes(ex))) continue;
            button.click();
            return `clicked icon ${selector}`;
        }
    }
    return 'none';
"#;

pub const CLICK_NEXT_PARCEL: &str = r#"
    const exclude = ['用户', '普通用户', '头像', '个人', '登录'];
    for (const el of document.querySelectorAll('div.zdkBtn, .zdkBtn')) {
        const text = (el.textContent || '').trim();
        if (exclude.some(ex => text.includes(ex))) continue;
        if (!text.includes('下一个')) continue;
        const rect = el.getBoundingClientRect();
        if (rect.top > window.innerHeight * 0.3) {
            el.click();
            return true;
        }
    }
    return false;
"#;

pub const CLICK_FIRST_THUMBNAIL: &str = r#"
    const inDialog = (el) => {
        for (let current = el; current; current = current.parentElement) {
            const name = String(current.className || '').toLowerCase();
            if (name.includes('dialog') || name.includes('modal')) return true;
        }
        return false;
    };
    const nearAvatar = (el) => {
        const texts = ['用户', '普通用户', '头像', '个人信息', '点击更换头像'];
        let current = el;
        for (let i = 0; i < 8 && current; i++) {
            const text = (current.textContent || '').trim();
            if (texts.some(t => text.includes(t))) return true;
            current = current.parentElement;
        }
        return false;
    };

    for (const container of document.querySelectorAll('.demo-image__preview')) {
        if (inDialog(container) || nearAvatar(container)) continue;
        const rect = container.getBoundingClientRect();
        if (rect.top < 100 || rect.left < window.innerWidth * 0.4) continue;
        if (rect.width < 50 || rect.height < 50) continue;
        (container.querySelector('img') || container).click();
        return true;
    }
    return false;
"#;

/// Any "last image" wording on the page or in a message box.
pub const LAST_IMAGE_INDICATOR: &str = r#"
    const texts = ['已经是最后一张了', '已经是最后一张', '已是最后'];
    const body = (document.body && document.body.innerText) || '';
    if (texts.some(t => body.includes(t))) return true;
    for (const selector of ['.el-message__content', '.el-message', '.toast']) {
        for (const toast of document.querySelectorAll(selector)) {
            const text = toast.textContent || '';
            if (texts.some(t => text.includes(t))) return true;
        }
    }
    return false;
"#;

/// The toast shown right after clicking next on the last image.
pub const LAST_IMAGE_TOAST: &str = r#"
    const texts = ['已经是最后一张了', '已经是最后一张'];
    const body = (document.body && document.body.innerText) || '';
    if (texts.some(t => body.includes(t))) return true;
    for (const selector of ['.el-message__content', '.toast', '.el-message']) {
        for (const toast of document.querySelectorAll(selector)) {
            const text = toast.textContent || '';
            if (texts.some(t => text.includes(t))) return true;
        }
    }
    return false;
"#;

/// Zoom the map in by `__LEVELS__` steps: map view objects first, then
/// synthetic wheel and double-click events on the map surface.
pub const ZOOM_MAP: &str = r#"
    const levels = __LEVELS__;
    for (const name of ['view', 'mapView', 'sceneView', '__esri_view__']) {
        const view = window[name];
        if (!view) continue;
        if (typeof view.zoom !== 'undefined') {
            try { view.zoom = view.zoom + levels; return `esri-zoom-${name}`; } catch (e) { }
        }
        if (typeof view.goTo === 'function') {
            try { view.goTo({ zoom: view.zoom + levels }); return `esri-goTo-${name}`; } catch (e) { }
        }
    }

    const container = document.querySelector('.esri-view');
    if (container) {
        for (const prop of ['__view', '_view', 'view', '__esriView']) {
            const view = container[prop];
            if (view && typeof view.zoom !== 'undefined') {
                try { view.zoom = view.zoom + levels; return `esri-element-${prop}`; } catch (e) { }
            }
        }
    }

    let map = null;
    for (const selector of ['.esri-view-surface', '.esri-view', 'canvas']) {
        map = document.querySelector(selector);
        if (map) break;
    }
    if (!map) return 'none';

    const rect = map.getBoundingClientRect();
    const clientX = rect.left + rect.width / 2;
    const clientY = rect.top + rect.height / 2;
    for (let i = 0; i < levels; i++) {
        map.dispatchEvent(new WheelEvent('wheel', {
            deltaY: -120, deltaMode: 0, clientX, clientY, bubbles: true, cancelable: true, view: window
        }));
    }
    map.dispatchEvent(new MouseEvent('dblclick', { clientX, clientY, bubbles: true, cancelable: true, view: window }));
    return 'fallback-wheel-dblclick';
"#;

/// Wait up to `__TIMEOUT_MS__` for the largest visible image in any reachable
/// document to load.
pub const WAIT_FOR_IMAGE: &str = r#"
(() => new Promise((resolve) => {
    const timeoutMs = __TIMEOUT_MS__;
    const selectors = [
        '.el-image__inner', '.el-carousel__item.is-active img', '.preview-image img',
        'img[src*="landcloud"]', 'img'
    ];
    const documents = [];
    const collect = (doc, depth) => {
        documents.push(doc);
        if (depth >= 5) return;
        for (const frame of doc.querySelectorAll('iframe, frame')) {
            try { if (frame.contentDocument) collect(frame.contentDocument, depth + 1); } catch (e) { }
        }
    };
    collect(document, 0);

    let target = null;
    let largest = 0;
    for (const doc of documents) {
        for (const selector of selectors) {
            for (const img of doc.querySelectorAll(selector)) {
                const rect = img.getBoundingClientRect();
                const area = rect.width * rect.height;
                if (area > largest && rect.width > 200 && rect.height > 200) {
                    largest = area;
                    target = img;
                }
            }
        }
    }

    if (!target) {
        resolve({ loaded: false, reason: 'no-image-found', waitedMs: 0 });
        return;
    }
    if (target.complete && target.naturalWidth > 0) {
        resolve({ loaded: true, reason: 'already-complete', waitedMs: 0 });
        return;
    }

    const start = Date.now();
    let done = false;
    const finish = (loaded, reason) => {
        if (done) return;
        done = true;
        target.removeEventListener('load', onLoad);
        target.removeEventListener('error', onError);
        resolve({ loaded, reason, waitedMs: Date.now() - start });
    };
    const onLoad = () => finish(true, 'onload');
    const onError = () => finish(false, 'error');
    target.addEventListener('load', onLoad);
    target.addEventListener('error', onError);
    setTimeout(() => finish(target.complete && target.naturalWidth > 0, 'timeout'), timeoutMs);
}))()
"#;

pub const HIDE_SCROLLBARS: &str = r#"
(() => {
    if (document.getElementById('parcelshot-capture-style')) return false;
    const style = document.createElement('style');
    style.id = 'parcelshot-capture-style';
    style.textContent = '::-webkit-scrollbar { display: none !important; } html, body { scrollbar-width: none !important; }';
    (document.head || document.documentElement).appendChild(style);
    return true;
})()
"#;

pub const RESTORE_SCROLLBARS: &str = r#"
(() => {
    const style = document.getElementById('parcelshot-capture-style');
    if (style) style.remove();
    return !!style;
})()
"#;

/// Transient status line; `__MESSAGE__` is a JSON string literal.
pub const TOAST: &str = r#"
(() => {
    const message = __MESSAGE__;
    const id = 'parcelshot-toast';
    const old = document.getElementById(id);
    if (old) old.remove();
    const toast = document.createElement('div');
    toast.id = id;
    toast.textContent = message;
    toast.style.cssText = 'position:fixed;top:20px;left:50%;transform:translateX(-50%);'
        + 'z-index:2147483647;background:rgba(0,0,0,0.8);color:#fff;padding:10px 18px;'
        + 'border-radius:6px;font-size:14px;pointer-events:none;';
    (document.body || document.documentElement).appendChild(toast);
    setTimeout(() => toast.remove(), 3000);
    return true;
})()
"#;

/// Blocking alert; resolves once the user dismissed it.
pub const ALERT: &str = r#"
(() => { alert(__MESSAGE__); return true; })()
"#;

/// Wrap a helper body so it runs against the main document and then every
/// same-origin frame. The first result that is neither `false` nor `"none"`
/// wins; otherwise the main document's result is returned.
pub fn in_every_document(body: &str) -> String {
    let mut script = String::with_capacity(body.len() + VISIBILITY.len() + 1024);
    script.push_str("(() => {\n");
    script.push_str("    const targets = [];\n");
    script.push_str("    const collect = (win, depth) => {\n");
    script.push_str("        targets.push(win);\n");
    script.push_str("        if (depth >= 5) return;\n");
    script.push_str("        for (let i = 0; i < win.frames.length; i++) {\n");
    script.push_str("            try { if (win.frames[i].document) collect(win.frames[i], depth + 1); } catch (e) { }\n");
    script.push_str("        }\n");
    script.push_str("    };\n");
    script.push_str("    collect(window, 0);\n");
    script.push_str("    let first;\n");
    script.push_str("    for (const target of targets) {\n");
    script.push_str("        let result;\n");
    script.push_str("        try {\n");
    script.push_str("            result = ((document, window) => {\n");
    script.push_str(VISIBILITY);
    script.push_str(body);
    script.push_str("            })(target.document, target);\n");
    script.push_str("        } catch (e) { result = undefined; }\n");
    script.push_str("        if (first === undefined) first = result;\n");
    script.push_str("        if (result !== undefined && result !== false && result !== 'none') return result;\n");
    script.push_str("    }\n");
    script.push_str("    return first === undefined ? null : first;\n");
    script.push_str("})()");
    script
}

/// `template` with `__MESSAGE__` replaced by `message` as a JSON string.
pub fn with_message(template: &str, message: &str) -> String {
    let literal = serde_json::to_string(message).unwrap_or_else(|_| "\"\"".to_string());
    template.replace("__MESSAGE__", &literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_helper_contains_body_and_prelude() {
        let script = in_every_document(CLICK_NEXT_PARCEL);
        assert!(script.starts_with("(() => {"));
        assert!(script.contains("isClickable"));
        assert!(script.contains(".zdkBtn"));
        assert!(script.ends_with("})()"));
    }

    #[test]
    fn test_message_is_escaped() {
        let script = with_message(ALERT, "say \"hi\"\n全部地块已截图完成！");
        assert!(script.contains(r#"alert("say \"hi\"\n全部地块已截图完成！")"#));
        assert!(!script.contains("__MESSAGE__"));
    }
}

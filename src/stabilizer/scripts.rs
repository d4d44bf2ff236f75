// In-page scripts. `__OPTIONS__` and `__SUPPRESSORS__` are substituted before evaluation.

pub const ANIMATION_STYLE_ID: &str = "quick-vrt-disable-animations";

pub const SCROLL_TO_TOP: &str = "window.scrollTo({ top: 0, left: 0, behavior: 'auto' }); true";

/// Reports what the page looks like before stabilization
pub const PAGE_INFO: &str = r#"(() => {
  const lazy = ['img[data-src]', 'img[data-srcset]', 'img[loading="lazy"]', '.lazy', '.lazyload'];
  let animated = document.querySelectorAll('[class*="animate"], [class*="animation"], .animated').length > 0;
  if (!animated) {
    const elements = document.querySelectorAll('*');
    for (let i = 0; i < Math.min(elements.length, 50); i++) {
      const style = window.getComputedStyle(elements[i]);
      if (style.animationDuration !== '0s' || style.transitionDuration !== '0s') { animated = true; break; }
    }
  }
  return {
    url: window.location.href,
    title: document.title,
    scrollWidth: document.documentElement.scrollWidth,
    scrollHeight: document.documentElement.scrollHeight,
    viewportWidth: window.innerWidth,
    viewportHeight: window.innerHeight,
    hasLazyImages: lazy.some(s => document.querySelector(s) !== null),
    hasAnimations: animated
  };
})()"#;

/// Undoes the animation style and smooth-scroll override, then returns to the top
pub const RESTORE_PAGE: &str = r#"(() => {
  const style = document.getElementById('quick-vrt-disable-animations');
  if (style) { style.remove(); }
  if (window.__quickVrtScrollBehavior !== undefined) {
    document.documentElement.style.scrollBehavior = window.__quickVrtScrollBehavior;
    delete window.__quickVrtScrollBehavior;
  }
  window.scrollTo({ top: 0, left: 0, behavior: 'auto' });
  return true;
})()"#;

pub const STABILIZE: &str = r#"(async () => {
  const opts = __OPTIONS__;
  const nativeSetTimeout = window.setTimeout.bind(window);
  const sleep = (ms) => new Promise(resolve => nativeSetTimeout(resolve, ms));
  const report = {
    animationsDisabled: false,
    suppressorFailures: [],
    infiniteScroll: false,
    lazyElements: 0,
    pendingImages: 0,
    imagesTimedOut: false,
    error: null
  };
  const lazySelectors = [
    'img[data-src]', 'img[data-srcset]', 'img[loading="lazy"]', 'picture[data-src]',
    'source[data-srcset]', '[data-bg]', '[data-background]', '[data-background-image]',
    '.lazy', '.lazyload', '.lazy-load'
  ];

  try {
    if (opts.disableAnimations && !document.getElementById('quick-vrt-disable-animations')) {
      const style = document.createElement('style');
      style.id = 'quick-vrt-disable-animations';
      style.textContent = `
        *, *::before, *::after {
          animation-duration: 0s !important;
          animation-delay: 0s !important;
          animation-iteration-count: 1 !important;
          transition-duration: 0s !important;
          transition-delay: 0s !important;
          transition-property: none !important;
        }`;
      (document.head || document.documentElement).appendChild(style);
      window.__quickVrtScrollBehavior = document.documentElement.style.scrollBehavior;
      document.documentElement.style.scrollBehavior = 'auto';
      __SUPPRESSORS__
      report.animationsDisabled = true;
    }

    if (opts.scrollThrough) {
      const initialHeight = document.documentElement.scrollHeight;
      const scrollLimit = Math.min(initialHeight, opts.maxScrollHeight);
      const step = Math.max(window.innerHeight, 100);
      let position = 0;
      while (position < scrollLimit) {
        position += step;
        window.scrollTo(0, position);
        await sleep(opts.scrollStepDelayMs);
        if (document.documentElement.scrollHeight > initialHeight) {
          report.infiniteScroll = true;
          break;
        }
      }
      window.scrollTo(0, 0);
    }

    if (opts.triggerLazyLoading) {
      const elements = document.querySelectorAll(lazySelectors.join(','));
      report.lazyElements = elements.length;
      elements.forEach(el => {
        if (el.dataset.src && !el.getAttribute('src')) { el.setAttribute('src', el.dataset.src); }
        if (el.dataset.srcset && !el.getAttribute('srcset')) { el.setAttribute('srcset', el.dataset.srcset); }
        if (el.loading === 'lazy') { el.loading = 'eager'; }
        const bg = el.dataset.bg || el.dataset.background || el.dataset.backgroundImage;
        if (bg) { el.style.backgroundImage = `url(${bg})`; }
      });
      elements.forEach(el => el.scrollIntoView({ behavior: 'auto', block: 'center' }));
      window.scrollTo(0, 0);
    }

    const pending = Array.from(document.images).filter(img => !img.complete);
    report.pendingImages = pending.length;
    if (pending.length > 0) {
      report.imagesTimedOut = await new Promise(resolve => {
        let settled = 0;
        const timer = nativeSetTimeout(() => resolve(true), opts.imageTimeoutMs);
        const done = () => {
          settled += 1;
          if (settled >= pending.length) { clearTimeout(timer); resolve(false); }
        };
        pending.forEach(img => {
          if (img.complete) { done(); return; }
          img.addEventListener('load', done, { once: true });
          img.addEventListener('error', done, { once: true });
        });
      });
    }
  } catch (e) {
    report.error = String((e && e.message) || e);
  } finally {
    window.scrollTo(0, 0);
  }

  await sleep(opts.settleDelayMs);
  return report;
})()"#;
